//! Feed aggregation pipeline.
//!
//! This crate drives the fetch → parse → expand → normalize →
//! deduplicate pipeline over a list of configured ICS sources:
//!
//! - [`FeedFetcher`] / [`HttpFetcher`] - the network seam
//! - [`SourceCache`] - TTL-bounded per-URL cache of raw documents
//! - [`parse_ics`] - the parser boundary producing [`RawEvent`] records
//! - [`RecurrenceExpander`] / [`RruleExpander`] - rule-string evaluation
//! - [`MasterEvent`] / normalization into `NormalizedEvent`
//! - [`Aggregator`] - the pipeline driver with merge/dedup/sort
//!
//! # Data flow
//!
//! ```text
//! sources ──▶ SourceCache ──▶ parse_ics ──▶ RawEvent*
//!                                              │
//!                     recurring? ──▶ RruleExpander ──▶ instants
//!                                              │
//!                                       normalize_occurrence
//!                                              │
//!                        merge ▶ dedup by id ▶ sort ▶ NormalizedEvent*
//! ```

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod fetch;
pub mod ics;
pub mod normalize;
pub mod raw_event;
pub mod recurrence;

pub use aggregate::{Aggregator, AggregatorConfig};
pub use cache::SourceCache;
pub use error::{FeedError, FeedErrorCode, FeedResult};
pub use fetch::{BoxFuture, FeedFetcher, HttpFetcher, HttpFetcherConfig};
pub use ics::parse_ics;
pub use normalize::{MasterEvent, normalize_occurrence};
pub use raw_event::RawEvent;
pub use recurrence::{ExpandError, RecurrenceExpander, RruleExpander};
