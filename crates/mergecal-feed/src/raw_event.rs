//! Raw event records from the parser boundary.
//!
//! [`RawEvent`] is the validated shape produced by the calendar-document
//! parser for VEVENT components, before normalization. Every field is
//! optional except what the parser can always provide; the normalizer
//! decides what is usable.

use chrono::{DateTime, Utc};
use mergecal_core::EventTime;

/// One raw calendar event record as yielded by the parser.
///
/// Other component kinds (VTODO, VTIMEZONE, ...) never produce a
/// `RawEvent`; that filtering happens at the parser boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEvent {
    /// The UID property, if present.
    pub uid: Option<String>,
    /// The SUMMARY property (event title), if present.
    pub summary: Option<String>,
    /// When the event starts.
    pub start: Option<EventTime>,
    /// When the event ends.
    pub end: Option<EventTime>,
    /// The LOCATION property, if present.
    pub location: Option<String>,
    /// The DESCRIPTION property, if present.
    pub description: Option<String>,
    /// The raw RRULE value string, if the event is recurring.
    pub rrule: Option<String>,
    /// EXDATE instants (UTC) removed from the recurrence set.
    pub exdates: Vec<DateTime<Utc>>,
}

impl RawEvent {
    /// Creates an empty raw event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the start representation is a bare date.
    pub fn is_all_day(&self) -> bool {
        self.start.as_ref().is_some_and(EventTime::is_all_day)
    }

    /// Returns true if the event carries a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    /// Builder method to set the UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start time.
    pub fn with_start(mut self, start: EventTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the end time.
    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
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

    /// Builder method to set the recurrence rule string.
    pub fn with_rrule(mut self, rrule: impl Into<String>) -> Self {
        self.rrule = Some(rrule.into());
        self
    }

    /// Builder method to add an exclusion date.
    pub fn with_exdate(mut self, exdate: DateTime<Utc>) -> Self {
        self.exdates.push(exdate);
        self
    }
}
