//! ICS/iCalendar parsing boundary.
//!
//! This module parses iCalendar (RFC 5545) documents and converts VEVENT
//! components to [`RawEvent`] records. Parsing is best-effort: a document
//! that fails to parse yields zero records with a warning, and individual
//! malformed fields are dropped rather than failing the record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::{Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event};
use tracing::{debug, warn};

use mergecal_core::EventTime;

use crate::raw_event::RawEvent;

/// Parses ICS content and extracts raw event records.
///
/// Only VEVENT components yield records; every other component kind is
/// filtered at this boundary.
pub fn parse_ics(ics: &str) -> Vec<RawEvent> {
    let calendar = match ics.parse::<Calendar>() {
        Ok(cal) => cal,
        Err(e) => {
            warn!(error = %e, "failed to parse ICS document");
            return Vec::new();
        }
    };

    calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(parse_event(event)),
            _ => None,
        })
        .collect()
}

/// Parses a single VEVENT component.
///
/// Missing fields stay `None`; the normalizer decides whether the record
/// is usable.
fn parse_event(event: &Event) -> RawEvent {
    use icalendar::EventLike;

    let mut raw = RawEvent::new();

    if let Some(uid) = event.get_uid() {
        raw = raw.with_uid(uid);
    }
    if let Some(start) = event.get_start() {
        raw = raw.with_start(convert_date_time(start));
    }
    if let Some(end) = event.get_end() {
        raw = raw.with_end(convert_date_time(end));
    }
    if let Some(summary) = event.get_summary() {
        raw = raw.with_summary(summary);
    }
    if let Some(description) = event.get_description() {
        raw = raw.with_description(description);
    }
    if let Some(location) = event.get_location() {
        raw = raw.with_location(location);
    }
    if let Some(rrule) = event.property_value("RRULE") {
        raw = raw.with_rrule(rrule);
    }
    raw.exdates = extract_exdates(event);

    debug!(
        uid = ?raw.uid,
        summary = ?raw.summary,
        recurring = raw.is_recurring(),
        "parsed VEVENT"
    );

    raw
}

/// Collects all EXDATE instants of an event.
///
/// EXDATE may appear as multiple properties, each carrying a
/// comma-separated list of values.
fn extract_exdates(event: &Event) -> Vec<DateTime<Utc>> {
    let Some(props) = event.multi_properties().get("EXDATE") else {
        return Vec::new();
    };

    props
        .iter()
        .flat_map(|prop| prop.value().split(','))
        .filter_map(|value| {
            let parsed = parse_ical_instant(value);
            if parsed.is_none() {
                warn!(value = %value, "dropping unparseable EXDATE value");
            }
            parsed
        })
        .collect()
}

/// Converts an icalendar `DatePerhapsTime` to an [`EventTime`].
fn convert_date_time(dt: DatePerhapsTime) -> EventTime {
    match dt {
        DatePerhapsTime::Date(date) => EventTime::from_date(date),
        DatePerhapsTime::DateTime(cdt) => {
            let utc_dt = match cdt {
                CalendarDateTime::Utc(dt) => dt,
                CalendarDateTime::Floating(naive) => Utc.from_utc_datetime(&naive),
                // Unresolved timezone identifiers are treated as UTC.
                CalendarDateTime::WithTimezone { date_time, tzid: _ } => {
                    Utc.from_utc_datetime(&date_time)
                }
            };
            EventTime::from_utc(utc_dt)
        }
    }
}

/// Parses an iCalendar instant string to a UTC datetime.
///
/// Handles the formats:
/// - `20240110T090000Z` (UTC)
/// - `20240110T090000` (floating, treated as UTC)
/// - `20240110` (date only, midnight UTC)
pub fn parse_ical_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        let date = NaiveDate::parse_from_str(s, "%Y%m%d").ok()?;
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    if let Some(stripped) = s.strip_suffix('Z') {
        let dt = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some(Utc.from_utc_datetime(&dt));
    }

    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}
