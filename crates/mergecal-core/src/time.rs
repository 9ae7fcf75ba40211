//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (which may be either a specific datetime or an all-day date), and
//! [`TimeWindow`] for defining aggregation query ranges.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the time of a calendar event.
///
/// Calendar events can have two types of times:
/// - **DateTime**: A specific point in time, stored as UTC
/// - **AllDay**: A date without a time-of-day component (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC instant.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_hms_opt(0, 0, 0).expect("valid time").and_utc(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// A time window for an aggregation request.
///
/// Represents a closed interval `[time_min, time_max]` in UTC. Both
/// boundaries are inclusive: an occurrence starting exactly at
/// `time_max` is still in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub time_min: DateTime<Utc>,
    /// End of the window (inclusive).
    pub time_max: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `time_min` is after `time_max`.
    pub fn new(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        assert!(time_min <= time_max, "TimeWindow time_min must be <= time_max");
        Self { time_min, time_max }
    }

    /// Creates a window around `now`: `[now - lookback, now + lookahead]`.
    pub fn around(now: DateTime<Utc>, lookback: Duration, lookahead: Duration) -> Self {
        Self::new(now - lookback, now + lookahead)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.time_max - self.time_min
    }

    /// Checks if an instant falls within this window (boundaries inclusive).
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.time_min <= dt && dt <= self.time_max
    }

    /// Checks if an event with the given start and end overlaps this window.
    ///
    /// An event overlaps iff `end >= time_min && start <= time_max`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        end >= self.time_min && start <= self.time_max
    }
}
