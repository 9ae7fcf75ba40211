//! Pipeline driver: fetch every source, merge, dedup, sort.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use mergecal_core::{NormalizedEvent, Source, TimeWindow};

use crate::cache::SourceCache;
use crate::error::{FeedError, FeedResult};
use crate::fetch::FeedFetcher;
use crate::ics::parse_ics;
use crate::normalize::{MasterEvent, normalize_occurrence};
use crate::recurrence::{RecurrenceExpander, RruleExpander};

/// Tuning knobs for an [`Aggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Upper bound on sources fetched at the same time. The effective
    /// concurrency is the smaller of this and the source count.
    pub max_concurrent_fetches: usize,
    /// Overall wall-clock budget for one aggregation, if any.
    pub deadline: Option<Duration>,
}

impl AggregatorConfig {
    /// Default cap on concurrent source fetches.
    pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

    /// Creates the default configuration: capped concurrency, no
    /// deadline.
    pub fn new() -> Self {
        Self {
            max_concurrent_fetches: Self::DEFAULT_MAX_CONCURRENT_FETCHES,
            deadline: None,
        }
    }

    /// Sets the concurrent fetch cap.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Sets an overall deadline for each aggregation.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges events from many ICS sources into one deduplicated, sorted
/// list.
///
/// A failing source fails the whole aggregation; there are no partial
/// results. Per-record problems (unusable records, bad recurrence
/// rules) degrade that record only.
pub struct Aggregator {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Arc<SourceCache>,
    expander: Arc<dyn RecurrenceExpander>,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Creates an aggregator over `fetcher` with a default cache,
    /// rule-based recurrence expansion, and default configuration.
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self {
            fetcher,
            cache: Arc::new(SourceCache::default()),
            expander: Arc::new(RruleExpander::new()),
            config: AggregatorConfig::new(),
        }
    }

    /// Replaces the source cache.
    pub fn with_cache(mut self, cache: Arc<SourceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the recurrence expander.
    pub fn with_expander(mut self, expander: Arc<dyn RecurrenceExpander>) -> Self {
        self.expander = expander;
        self
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the source cache shared by this aggregator.
    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    /// Aggregates events from `sources` that fall within `window`.
    ///
    /// Honors the configured deadline, if any.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty source list, a fetch
    /// or network error when any source cannot be retrieved, and a
    /// deadline error when the time budget runs out.
    pub async fn aggregate(
        &self,
        sources: &[Source],
        window: &TimeWindow,
    ) -> FeedResult<Vec<NormalizedEvent>> {
        match self.config.deadline {
            Some(deadline) => self.aggregate_with_deadline(sources, window, deadline).await,
            None => self.aggregate_inner(sources, window).await,
        }
    }

    /// Aggregates with an explicit wall-clock budget.
    ///
    /// # Errors
    ///
    /// As [`Aggregator::aggregate`], plus a deadline error when the
    /// budget elapses before every source has been processed.
    pub async fn aggregate_with_deadline(
        &self,
        sources: &[Source],
        window: &TimeWindow,
        deadline: Duration,
    ) -> FeedResult<Vec<NormalizedEvent>> {
        tokio::time::timeout(deadline, self.aggregate_inner(sources, window))
            .await
            .map_err(|_| {
                FeedError::deadline(format!(
                    "aggregation exceeded {}ms budget",
                    deadline.as_millis()
                ))
            })?
    }

    async fn aggregate_inner(
        &self,
        sources: &[Source],
        window: &TimeWindow,
    ) -> FeedResult<Vec<NormalizedEvent>> {
        if sources.is_empty() {
            return Err(FeedError::configuration("no sources configured"));
        }

        let concurrency = sources.len().min(self.config.max_concurrent_fetches);

        // buffered preserves source-list order, which the last-wins
        // dedup below depends on. The futures are boxed to erase the
        // opaque `async fn` type; leaving it opaque trips rustc's
        // "implementation of `FnOnce` is not general enough" limitation
        // (rust-lang/rust#89976) when callers spawn this future.
        let fetches: Vec<
            std::pin::Pin<Box<dyn Future<Output = FeedResult<Vec<NormalizedEvent>>> + Send + '_>>,
        > = sources
            .iter()
            .map(|source| {
                Box::pin(self.collect_source(source, window))
                    as std::pin::Pin<Box<dyn Future<Output = _> + Send + '_>>
            })
            .collect();
        let per_source: Vec<Vec<NormalizedEvent>> = stream::iter(fetches)
            .buffered(concurrency)
            .try_collect()
            .await?;

        let mut by_id: HashMap<String, NormalizedEvent> = HashMap::new();
        for event in per_source.into_iter().flatten() {
            by_id.insert(event.id.clone(), event);
        }

        let mut events: Vec<NormalizedEvent> = by_id.into_values().collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

        debug!(count = events.len(), sources = sources.len(), "aggregation complete");
        Ok(events)
    }

    /// Fetches and normalizes one source.
    ///
    /// Events are emitted in document order, with each recurring series
    /// expanded in occurrence order.
    async fn collect_source(
        &self,
        source: &Source,
        window: &TimeWindow,
    ) -> FeedResult<Vec<NormalizedEvent>> {
        let body = self.cache.fetch_through(&*self.fetcher, &source.url).await?;
        let records = parse_ics(&body);

        let mut events = Vec::new();
        for raw in &records {
            let Some(master) = MasterEvent::from_raw(raw) else {
                continue;
            };

            if let Some(ref rule) = master.rrule {
                let instants = match self.expander.expand(
                    rule,
                    master.start_utc(),
                    &master.exdates,
                    window,
                ) {
                    Ok(instants) => instants,
                    Err(err) => {
                        warn!(
                            uid = %master.uid,
                            label = %source.label,
                            error = %err,
                            "dropping occurrences of series with unusable rule"
                        );
                        continue;
                    }
                };
                for start in instants {
                    events.push(normalize_occurrence(&master, start, &source.label));
                }
            } else if window.overlaps(master.start_utc(), master.end_utc()) {
                events.push(normalize_occurrence(
                    &master,
                    master.start_utc(),
                    &source.label,
                ));
            }
        }

        debug!(
            label = %source.label,
            records = records.len(),
            events = events.len(),
            "source processed"
        );
        Ok(events)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedErrorCode;
    use crate::fetch::BoxFuture;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    /// Serves canned documents from memory; unknown URLs 404.
    struct StaticFetcher {
        docs: HashMap<String, String>,
        delay: Option<Duration>,
    }

    impl StaticFetcher {
        fn new() -> Self {
            Self {
                docs: HashMap::new(),
                delay: None,
            }
        }

        fn with_doc(mut self, url: &str, body: impl Into<String>) -> Self {
            self.docs.insert(url.to_string(), body.into());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl FeedFetcher for StaticFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FeedResult<String>> {
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                match self.docs.get(url) {
                    Some(body) => Ok(body.clone()),
                    None => Err(FeedError::fetch(404, url)),
                }
            })
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn january_window() -> TimeWindow {
        TimeWindow::new(utc(2024, 1, 1, 0, 0, 0), utc(2024, 1, 31, 23, 59, 59))
    }

    fn wrap_ics(body: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n",
            body
        )
    }

    fn standup_doc() -> String {
        wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:abc123\r\n\
             SUMMARY:Standup\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T093000Z\r\n\
             LOCATION:Room 101\r\n\
             END:VEVENT\r\n",
        )
    }

    fn aggregator_for(fetcher: StaticFetcher) -> Aggregator {
        Aggregator::new(Arc::new(fetcher))
    }

    #[tokio::test]
    async fn single_timed_event_normalizes() {
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", standup_doc());
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];

        let events = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        let wire = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "id": "abc123|2024-01-10T09:00:00Z",
                "title": "Standup",
                "start": "2024-01-10T09:00:00Z",
                "end": "2024-01-10T09:30:00Z",
                "allDay": false,
                "location": "Room 101",
                "source": "ics:A"
            })
        );
    }

    #[tokio::test]
    async fn weekly_series_expands_within_window() {
        let doc = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:weekly1\r\n\
             SUMMARY:Weekly sync\r\n\
             DTSTART:20240101T100000Z\r\n\
             DTEND:20240101T103000Z\r\n\
             RRULE:FREQ=WEEKLY\r\n\
             END:VEVENT\r\n",
        );
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", doc);
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];
        let window = TimeWindow::new(utc(2024, 1, 1, 0, 0, 0), utc(2024, 1, 16, 0, 0, 0));

        let events = aggregator.aggregate(&sources, &window).await.unwrap();

        assert_eq!(events.len(), 3);
        let starts: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            starts,
            vec![
                "weekly1|2024-01-01T10:00:00Z",
                "weekly1|2024-01-08T10:00:00Z",
                "weekly1|2024-01-15T10:00:00Z",
            ]
        );
        for event in &events {
            assert_eq!(event.end - event.start, chrono::TimeDelta::minutes(30));
        }
    }

    #[tokio::test]
    async fn failing_source_fails_the_whole_request() {
        let fetcher = StaticFetcher::new().with_doc("https://good.example/cal.ics", standup_doc());
        let aggregator = aggregator_for(fetcher);
        let sources = vec![
            Source::new("https://good.example/cal.ics", "good"),
            Source::new("https://missing.example/cal.ics", "missing"),
        ];

        let err = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap_err();

        assert_eq!(err.code(), FeedErrorCode::FetchFailed);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.url(), Some("https://missing.example/cal.ics"));
    }

    #[tokio::test]
    async fn duplicate_ids_later_source_wins() {
        let early = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:shared\r\n\
             SUMMARY:First version\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             END:VEVENT\r\n",
        );
        let late = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:shared\r\n\
             SUMMARY:Second version\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             END:VEVENT\r\n",
        );
        let fetcher = StaticFetcher::new()
            .with_doc("https://a.example/cal.ics", early)
            .with_doc("https://b.example/cal.ics", late);
        let aggregator = aggregator_for(fetcher);
        let sources = vec![
            Source::new("https://a.example/cal.ics", "A"),
            Source::new("https://b.example/cal.ics", "B"),
        ];

        let events = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Second version");
        assert_eq!(events[0].source, "ics:B");
    }

    #[tokio::test]
    async fn output_sorted_by_start_then_id() {
        let doc = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:zzz\r\n\
             SUMMARY:Later uid\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:aaa\r\n\
             SUMMARY:Earlier uid\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:mid\r\n\
             SUMMARY:Earlier start\r\n\
             DTSTART:20240105T090000Z\r\n\
             DTEND:20240105T100000Z\r\n\
             END:VEVENT\r\n",
        );
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", doc);
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];

        let events = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "mid|2024-01-05T09:00:00Z",
                "aaa|2024-01-10T09:00:00Z",
                "zzz|2024-01-10T09:00:00Z",
            ]
        );
    }

    #[tokio::test]
    async fn empty_source_list_is_a_configuration_error() {
        let aggregator = aggregator_for(StaticFetcher::new());

        let err = aggregator
            .aggregate(&[], &january_window())
            .await
            .unwrap_err();

        assert_eq!(err.code(), FeedErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn aggregation_is_idempotent() {
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", standup_doc());
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];
        let window = january_window();

        let first = aggregator.aggregate(&sources, &window).await.unwrap();
        let second = aggregator.aggregate(&sources, &window).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn events_outside_the_window_are_dropped() {
        let doc = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:inside\r\n\
             SUMMARY:Inside\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:outside\r\n\
             SUMMARY:Outside\r\n\
             DTSTART:20240301T090000Z\r\n\
             DTEND:20240301T100000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:straddles\r\n\
             SUMMARY:Straddles the lower bound\r\n\
             DTSTART:20231231T230000Z\r\n\
             DTEND:20240101T010000Z\r\n\
             END:VEVENT\r\n",
        );
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", doc);
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];

        let events = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "straddles|2023-12-31T23:00:00Z",
                "inside|2024-01-10T09:00:00Z",
            ]
        );
    }

    #[tokio::test]
    async fn unusable_rule_degrades_that_series_only() {
        let doc = wrap_ics(
            "BEGIN:VEVENT\r\n\
             UID:broken\r\n\
             SUMMARY:Broken series\r\n\
             DTSTART:20240110T090000Z\r\n\
             DTEND:20240110T100000Z\r\n\
             RRULE:FREQ=NOT-A-FREQ\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:fine\r\n\
             SUMMARY:Fine\r\n\
             DTSTART:20240111T090000Z\r\n\
             DTEND:20240111T100000Z\r\n\
             END:VEVENT\r\n",
        );
        let fetcher = StaticFetcher::new().with_doc("https://a.example/cal.ics", doc);
        let aggregator = aggregator_for(fetcher);
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];

        let events = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Fine");
    }

    #[tokio::test]
    async fn deadline_aborts_a_slow_aggregation() {
        let fetcher = StaticFetcher::new()
            .with_doc("https://a.example/cal.ics", standup_doc())
            .with_delay(Duration::from_millis(200));
        let aggregator =
            aggregator_for(fetcher).with_config(AggregatorConfig::new().with_deadline(Duration::from_millis(10)));
        let sources = vec![Source::new("https://a.example/cal.ics", "A")];

        let err = aggregator
            .aggregate(&sources, &january_window())
            .await
            .unwrap_err();

        assert_eq!(err.code(), FeedErrorCode::DeadlineExceeded);
    }
}
