//! Core types: event times, query windows, normalized events, tracing

pub mod event;
pub mod source;
pub mod time;
pub mod tracing;

pub use event::{NormalizedEvent, format_utc, occurrence_id};
pub use source::Source;
pub use time::{EventTime, TimeWindow};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
