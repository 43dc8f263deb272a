//! Fetching remote feeds.

#[cfg(feature = "http")]
pub mod http;
pub mod traits;

#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use traits::DataFetcher;
