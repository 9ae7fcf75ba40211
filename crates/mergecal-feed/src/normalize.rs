//! Raw record to canonical event conversion.
//!
//! The normalizer has two halves: deriving a [`MasterEvent`] from a raw
//! parser record (which is where skip decisions happen), and producing
//! one `NormalizedEvent` per occurrence start instant.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::trace;

use mergecal_core::{EventTime, NormalizedEvent, format_utc};

use crate::raw_event::RawEvent;

/// Title used when a record has no usable summary.
pub const FALLBACK_TITLE: &str = "(No title)";

/// The template definition from which occurrences are derived.
///
/// Every occurrence of the series shares this fixed duration; there are
/// no per-instance duration overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEvent {
    /// Series identity: explicit UID, or a synthesized stable key.
    pub uid: String,
    /// Event title.
    pub title: String,
    /// Start of the master occurrence.
    pub start: EventTime,
    /// End of the master occurrence.
    pub end: EventTime,
    /// The raw recurrence rule string, if the series recurs.
    pub rrule: Option<String>,
    /// Instants removed from the recurrence set.
    pub exdates: Vec<DateTime<Utc>>,
    /// Event location, if any.
    pub location: Option<String>,
    /// Event description, if any.
    pub description: Option<String>,
}

impl MasterEvent {
    /// Derives a master event from a raw parser record.
    ///
    /// Returns `None` (the record is skipped) when start or end is
    /// missing, or when the record would violate `end >= start`.
    pub fn from_raw(raw: &RawEvent) -> Option<Self> {
        let start = raw.start.clone()?;
        let end = raw.end.clone()?;

        if end.to_utc_datetime() < start.to_utc_datetime() {
            trace!(uid = ?raw.uid, "skipping record with end before start");
            return None;
        }

        let uid = match raw.uid {
            Some(ref uid) => uid.clone(),
            None => synthesize_uid(raw, &start),
        };

        let title = raw
            .summary
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());

        Some(Self {
            uid,
            title,
            start,
            end,
            rrule: raw.rrule.clone(),
            exdates: raw.exdates.clone(),
            location: raw.location.clone(),
            description: raw.description.clone(),
        })
    }

    /// The master's start as a UTC instant.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.to_utc_datetime()
    }

    /// The master's end as a UTC instant.
    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.to_utc_datetime()
    }

    /// The fixed series duration, `end - start`.
    pub fn duration(&self) -> TimeDelta {
        self.end_utc() - self.start_utc()
    }

    /// True when the start representation is a bare date.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// True when the master carries a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }
}

/// Builds a series key for records without an explicit UID.
///
/// The key is derived from fields that do not change across repeated
/// parses of the same unchanged document, so the identity stays stable.
fn synthesize_uid(raw: &RawEvent, start: &EventTime) -> String {
    format!(
        "{}|{}|{}",
        raw.summary.as_deref().unwrap_or_default(),
        format_utc(start.to_utc_datetime()),
        raw.location.as_deref().unwrap_or_default(),
    )
}

/// Normalizes one occurrence of a master event.
///
/// The occurrence end is the start plus the master's fixed duration;
/// the all-day flag, location, and description carry over from the
/// master, and `source` is tagged `ics:<label>`.
pub fn normalize_occurrence(
    master: &MasterEvent,
    start: DateTime<Utc>,
    label: &str,
) -> NormalizedEvent {
    let mut event = NormalizedEvent::new(
        &master.uid,
        master.title.clone(),
        start,
        start + master.duration(),
        master.is_all_day(),
        label,
    );
    if let Some(ref location) = master.location {
        event = event.with_location(location);
    }
    if let Some(ref description) = master.description {
        event = event.with_description(description);
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn sample_raw() -> RawEvent {
        RawEvent::new()
            .with_uid("standup-uid")
            .with_summary("Standup")
            .with_start(EventTime::from_utc(utc(2024, 1, 10, 9, 0, 0)))
            .with_end(EventTime::from_utc(utc(2024, 1, 10, 9, 30, 0)))
    }

    mod master_derivation {
        use super::*;

        #[test]
        fn derives_minimal_master() {
            let master = MasterEvent::from_raw(&sample_raw()).unwrap();

            assert_eq!(master.uid, "standup-uid");
            assert_eq!(master.title, "Standup");
            assert_eq!(master.duration(), TimeDelta::minutes(30));
            assert!(!master.is_recurring());
            assert!(!master.is_all_day());
        }

        #[test]
        fn skips_record_without_start() {
            let raw = RawEvent::new()
                .with_uid("x")
                .with_end(EventTime::from_utc(utc(2024, 1, 10, 9, 0, 0)));
            assert!(MasterEvent::from_raw(&raw).is_none());
        }

        #[test]
        fn skips_record_without_end() {
            let raw = RawEvent::new()
                .with_uid("x")
                .with_start(EventTime::from_utc(utc(2024, 1, 10, 9, 0, 0)));
            assert!(MasterEvent::from_raw(&raw).is_none());
        }

        #[test]
        fn skips_record_with_end_before_start() {
            let raw = RawEvent::new()
                .with_uid("x")
                .with_start(EventTime::from_utc(utc(2024, 1, 10, 10, 0, 0)))
                .with_end(EventTime::from_utc(utc(2024, 1, 10, 9, 0, 0)));
            assert!(MasterEvent::from_raw(&raw).is_none());
        }

        #[test]
        fn explicit_uid_is_preferred() {
            let master = MasterEvent::from_raw(&sample_raw().with_location("Room 1")).unwrap();
            assert_eq!(master.uid, "standup-uid");
        }

        #[test]
        fn synthesized_uid_is_stable_across_reparses() {
            let raw = RawEvent::new()
                .with_summary("Standup")
                .with_start(EventTime::from_utc(utc(2024, 1, 10, 9, 0, 0)))
                .with_end(EventTime::from_utc(utc(2024, 1, 10, 9, 30, 0)))
                .with_location("Room 101");

            let first = MasterEvent::from_raw(&raw).unwrap();
            let second = MasterEvent::from_raw(&raw.clone()).unwrap();

            assert_eq!(first.uid, "Standup|2024-01-10T09:00:00Z|Room 101");
            assert_eq!(first.uid, second.uid);
        }

        #[test]
        fn blank_title_gets_fallback() {
            let raw = sample_raw().with_summary("   ");
            let master = MasterEvent::from_raw(&raw).unwrap();
            assert_eq!(master.title, FALLBACK_TITLE);

            let mut raw = sample_raw();
            raw.summary = None;
            let master = MasterEvent::from_raw(&raw).unwrap();
            assert_eq!(master.title, FALLBACK_TITLE);
        }

        #[test]
        fn all_day_master() {
            let raw = RawEvent::new()
                .with_uid("holiday")
                .with_start(EventTime::from_date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()))
                .with_end(EventTime::from_date(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()));

            let master = MasterEvent::from_raw(&raw).unwrap();
            assert!(master.is_all_day());
            assert_eq!(master.duration(), TimeDelta::days(1));
        }
    }

    mod occurrence_normalization {
        use super::*;

        #[test]
        fn occurrence_keeps_master_duration() {
            let master = MasterEvent::from_raw(&sample_raw().with_rrule("FREQ=WEEKLY")).unwrap();

            let occurrence = normalize_occurrence(&master, utc(2024, 1, 17, 9, 0, 0), "A");

            assert_eq!(occurrence.id, "standup-uid|2024-01-17T09:00:00Z");
            assert_eq!(occurrence.end - occurrence.start, master.duration());
            assert_eq!(occurrence.source, "ics:A");
        }

        #[test]
        fn optional_fields_carry_over() {
            let raw = sample_raw()
                .with_location("Room 101")
                .with_description("Daily sync");
            let master = MasterEvent::from_raw(&raw).unwrap();

            let occurrence = normalize_occurrence(&master, master.start_utc(), "work");

            assert_eq!(occurrence.location.as_deref(), Some("Room 101"));
            assert_eq!(occurrence.description.as_deref(), Some("Daily sync"));
            assert!(!occurrence.all_day);
        }

        #[test]
        fn end_never_precedes_start() {
            let master = MasterEvent::from_raw(&sample_raw()).unwrap();
            let occurrence = normalize_occurrence(&master, utc(2024, 2, 1, 9, 0, 0), "A");
            assert!(occurrence.end >= occurrence.start);
        }
    }
}
