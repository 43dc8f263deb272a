//! [`DataFetcher`] backed by reqwest.

use std::future::Future;
use std::pin::Pin;

use log::debug;

use crate::models::types::{FeedError, Result};
use crate::network::traits::DataFetcher;

/// Downloads feeds over HTTP(S), following redirects.
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DataFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            let fetch_error = |e: reqwest::Error| FeedError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            };

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(fetch_error)?
                .error_for_status()
                .map_err(fetch_error)?;
            let bytes = response.bytes().await.map_err(fetch_error)?;

            debug!("Fetched {} bytes from {}", bytes.len(), url);
            Ok(bytes.to_vec())
        })
    }
}
