//! The canonical event record produced by aggregation.
//!
//! [`NormalizedEvent`] is the wire shape other layers depend on: UTC
//! instants at second precision with a trailing `Z`, an `id` that
//! uniquely identifies one occurrence of one series, and a `source` tag
//! naming the feed the record came from.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Formats a UTC instant at second precision with a trailing `Z`,
/// e.g. `2024-01-10T09:00:00Z`. No fractional seconds.
pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builds the occurrence identity `<uid>|<startISO>`.
///
/// Unique per (series, occurrence) pair: two records with the same id
/// are the same logical occurrence.
pub fn occurrence_id(uid: &str, start: DateTime<Utc>) -> String {
    format!("{}|{}", uid, format_utc(start))
}

/// One normalized calendar occurrence.
///
/// Instances are created fresh per aggregation request and never
/// persisted. The invariant `end >= start` holds for every emitted
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    /// `<uid>|<startISO>`, unique across the merged result.
    pub id: String,
    /// The event title.
    pub title: String,
    /// Start instant (UTC, second precision on the wire).
    #[serde(with = "utc_seconds")]
    pub start: DateTime<Utc>,
    /// End instant (UTC, second precision on the wire).
    #[serde(with = "utc_seconds")]
    pub end: DateTime<Utc>,
    /// True when the raw start carried no time-of-day component.
    pub all_day: bool,
    /// Event location, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Event description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `ics:<label>` of the feed this occurrence came from.
    pub source: String,
}

impl NormalizedEvent {
    /// Creates a normalized event with the required fields, deriving the
    /// id from `uid` and `start`.
    pub fn new(
        uid: &str,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        all_day: bool,
        label: &str,
    ) -> Self {
        Self {
            id: occurrence_id(uid, start),
            title: title.into(),
            start,
            end,
            all_day,
            location: None,
            description: None,
            source: format!("ics:{}", label),
        }
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The start instant as its wire string.
    ///
    /// Ascending lexicographic order of this string matches
    /// chronological order, since the format is fixed-width UTC.
    pub fn start_iso(&self) -> String {
        format_utc(self.start)
    }

    /// The end instant as its wire string.
    pub fn end_iso(&self) -> String {
        format_utc(self.end)
    }
}

/// Serde adapter fixing timestamps to second precision with `Z`.
mod utc_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_utc(*dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}
