//! HTTP server exposing merged calendar feeds.
//!
//! One endpoint, `GET /api/aggregate`, fetches every configured ICS
//! source, runs the aggregation pipeline from `mergecal-feed`, and
//! returns a `{range, count, events}` envelope. Sources and window
//! defaults come from the environment; see [`ServerConfig`].

pub mod config;
pub mod handler;

pub use config::{ConfigError, ServerConfig};
pub use handler::{AggregateBody, AggregateQuery, ApiError, AppState, RangeBody, router};
