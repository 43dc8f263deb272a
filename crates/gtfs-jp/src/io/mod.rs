//! Reading and writing feeds.
//!
//! Cells are trimmed, and the values in [`table::NA_VALUES`] read as missing.
//! Column names lose any UTF-8 byte order mark and surrounding whitespace.

pub mod reader;
pub mod source;
pub mod table;
pub mod writer;

pub use reader::{read_feed, read_feed_from_bytes, read_feed_from_path, ReadOptions};
pub use source::{list_feed, FileEntry};
