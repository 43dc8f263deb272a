//! Pluggable networking traits.
//!
//! Implement [`DataFetcher`] to control how remote feeds are downloaded
//! (custom clients, caching, offline fixtures).

use std::future::Future;
use std::pin::Pin;

use crate::models::types::Result;

/// Fetch raw bytes from a URL
pub trait DataFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;
}
