//! # gtfs-jp-kit
//!
//! Reading, checking and analysing GTFS-JP feeds: the Japanese extension of
//! GTFS published under the MLIT "standard bus information format" guideline.
//!
//! ## Features
//!
//! - **Typed tables**: one serde record per GTFS-JP file, including the
//!   `agency_jp`, `office_jp` and `pattern_jp` extensions
//! - **Directories, archives and URLs**: read a feed from any of them and
//!   write it back as a directory or a zip archive
//! - **Service calendar**: which services and trips run on which dates
//! - **Geometry**: stop points, shape lines, distances along shapes, and an
//!   R-tree for nearby-stop queries
//! - **Analysis**: per-trip stats, route and stop timetables, subsets by
//!   route, trip, agency or date, and removal of unused rows
//! - **Validation**: primary keys, foreign keys and value checks
//!
//! ## Example
//!
//! ```no_run
//! use gtfs_jp_kit::prelude::*;
//!
//! # fn main() -> gtfs_jp_kit::models::Result<()> {
//! let feed = read_feed_from_path("japan_data/hakodate_shiden.zip", &ReadOptions::default())?;
//!
//! println!("{}", feed.describe());
//! let week = feed.get_first_week();
//! if let Some(busiest) = feed.compute_busiest_date(&week) {
//!     println!("{} trips on {}", feed.get_trips(Some(busiest)).len(), busiest);
//! }
//!
//! let report = validate(&feed);
//! assert!(report.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod cleaning;
pub mod export;
pub mod feed;
pub mod geometry;
pub mod identifiers;
pub mod io;
pub mod models;
pub mod network;
pub mod schedule;
pub mod schema;
pub mod spatial;
pub mod stats;
pub mod subset;
pub mod summary;
pub mod timetable;
pub mod validation;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub mod prelude {
    pub use crate::feed::{Feed, FieldInfo};
    pub use crate::identifiers::*;
    pub use crate::io::{
        list_feed, read_feed, read_feed_from_bytes, read_feed_from_path, FileEntry, ReadOptions,
    };
    pub use crate::models::{FeedError, GtfsTime, Result, ServiceCalendar};
    pub use crate::network::DataFetcher;
    #[cfg(feature = "http")]
    pub use crate::network::HttpFetcher;
    pub use crate::schema::{DistUnits, TableName};
    pub use crate::spatial::StopIndex;
    pub use crate::stats::TripStats;
    pub use crate::summary::FeedSummary;
    pub use crate::timetable::TimetableRow;
    pub use crate::validation::{validate, Issue, Severity, ValidationReport};
}

pub use prelude::*;
