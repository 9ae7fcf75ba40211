//! Per-URL document cache with TTL support.
//!
//! [`SourceCache`] keeps the raw text of each fetched feed for a fixed
//! time-to-live so repeated aggregation requests do not refetch
//! unchanged documents. The cache is an explicitly constructed object
//! injected into the aggregator; there is no module-level state.
//!
//! Concurrency discipline: the check-TTL-then-fetch-then-store sequence
//! for one URL is a critical section. Each URL owns an async slot lock
//! that is held across the network fetch, so concurrent requests for the
//! same URL coalesce into a single upstream fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::FeedResult;
use crate::fetch::FeedFetcher;

/// A cached raw document.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The raw document text.
    text: String,
    /// When the document was fetched (monotonic clock).
    fetched_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
}

/// Per-source-URL cache of fetched raw documents.
pub struct SourceCache {
    /// Time-to-live for cached documents.
    ttl: Duration,
    /// One slot per URL; the outer lock only guards the map shape.
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl SourceCache {
    /// Default TTL: 5 minutes.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Creates a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the document for `url`, fetching through `fetcher` when
    /// the cached copy is missing or stale.
    ///
    /// Failures are never cached: a failed fetch leaves the slot
    /// unchanged and the next call retries from scratch.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's error unchanged.
    pub async fn fetch_through(
        &self,
        fetcher: &dyn FeedFetcher,
        url: &str,
    ) -> FeedResult<String> {
        let slot = self.slot_for(url).await;
        let mut slot = slot.lock().await;

        if let Some(ref entry) = slot.entry
            && entry.is_fresh(self.ttl)
        {
            trace!(url = %url, "cache hit");
            return Ok(entry.text.clone());
        }

        // Slot lock stays held across the fetch: concurrent callers for
        // this URL wait here instead of racing upstream.
        let text = fetcher.fetch(url).await?;
        debug!(url = %url, bytes = text.len(), "cached fresh document");
        slot.entry = Some(CacheEntry {
            text: text.clone(),
            fetched_at: Instant::now(),
        });
        Ok(text)
    }

    /// Drops the cached document for `url`, if any.
    pub async fn invalidate(&self, url: &str) {
        let mut slots = self.slots.lock().await;
        if slots.remove(url).is_some() {
            debug!(url = %url, "invalidated cache entry");
        }
    }

    /// Drops all cached documents.
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        let count = slots.len();
        slots.clear();
        debug!(count = count, "cleared source cache");
    }

    /// Number of URLs with a slot (fresh or stale).
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Returns true if no URL has been cached.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    async fn slot_for(&self, url: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(url.to_string()).or_default())
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl std::fmt::Debug for SourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache").field("ttl", &self.ttl).finish()
    }
}
