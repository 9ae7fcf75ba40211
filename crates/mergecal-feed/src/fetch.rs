//! The network seam: fetching raw calendar documents.
//!
//! [`FeedFetcher`] is the object-safe trait the cache and aggregator
//! depend on; [`HttpFetcher`] is the reqwest-backed implementation. No
//! retries happen here - a failed fetch propagates immediately.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::error::{FeedError, FeedResult};

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so fetchers can be swapped
/// behind `dyn FeedFetcher` (notably with stubs in tests).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Retrieves the raw text of a calendar document.
pub trait FeedFetcher: Send + Sync {
    /// Fetches the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] with the HTTP status and URL when the
    /// upstream response is not successful, or a network error when the
    /// request itself fails.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<String>>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl HttpFetcherConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("mergecal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP fetcher backed by reqwest.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a new HTTP fetcher with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: HttpFetcherConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                FeedError::internal(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn fetch_inner(&self, url: &str) -> FeedResult<String> {
        let parsed = Url::parse(url).map_err(|e| {
            FeedError::configuration(format!("invalid source url: {}", e)).with_url(url)
        })?;

        trace!(url = %url, "sending GET request");

        let response = self.client.get(parsed).send().await.map_err(|e| {
            FeedError::network(format!("request failed: {}", e))
                .with_url(url)
                .with_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::fetch(status.as_u16(), url));
        }

        let text = response.text().await.map_err(|e| {
            FeedError::network(format!("failed to read response body: {}", e))
                .with_url(url)
                .with_source(e)
        })?;

        debug!(url = %url, bytes = text.len(), "fetched document");
        Ok(text)
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<String>> {
        Box::pin(self.fetch_inner(url))
    }
}
