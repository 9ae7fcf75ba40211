//! Recurrence expansion.
//!
//! [`RecurrenceExpander`] is the narrow seam between the pipeline and
//! the rule-evaluation engine: rule string in, ordered occurrence
//! instants out. [`RruleExpander`] implements it with the `rrule` crate;
//! swapping the grammar/engine never touches the aggregator.

use chrono::{DateTime, Utc};
use rrule::{RRule, Tz, Unvalidated};
use thiserror::Error;
use tracing::warn;

use mergecal_core::TimeWindow;

/// A recurrence rule string that could not be evaluated.
///
/// Callers degrade the affected series to zero occurrences; this error
/// never fails a whole aggregation.
#[derive(Debug, Error)]
#[error("invalid recurrence rule: {0}")]
pub struct ExpandError(String);

/// Computes the occurrence start instants of a recurring series that
/// intersect a time window.
pub trait RecurrenceExpander: Send + Sync {
    /// Expands `rule` anchored at `dtstart`, removes instants matching
    /// `exdates` exactly, and returns the start instants within the
    /// closed `[time_min, time_max]` window, in generator order.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError`] when the rule string cannot be parsed or
    /// validated.
    fn expand(
        &self,
        rule: &str,
        dtstart: DateTime<Utc>,
        exdates: &[DateTime<Utc>],
        window: &TimeWindow,
    ) -> Result<Vec<DateTime<Utc>>, ExpandError>;
}

/// Recurrence expander backed by the `rrule` crate.
#[derive(Debug, Clone)]
pub struct RruleExpander {
    /// Hard cap on occurrences enumerated per series.
    max_occurrences: u16,
}

impl RruleExpander {
    /// Default occurrence cap per series.
    pub const DEFAULT_MAX_OCCURRENCES: u16 = 1000;

    /// Creates an expander with the default occurrence cap.
    pub fn new() -> Self {
        Self {
            max_occurrences: Self::DEFAULT_MAX_OCCURRENCES,
        }
    }

    /// Sets the occurrence cap.
    #[must_use]
    pub fn with_max_occurrences(mut self, max: u16) -> Self {
        self.max_occurrences = max;
        self
    }
}

impl Default for RruleExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl RecurrenceExpander for RruleExpander {
    fn expand(
        &self,
        rule: &str,
        dtstart: DateTime<Utc>,
        exdates: &[DateTime<Utc>],
        window: &TimeWindow,
    ) -> Result<Vec<DateTime<Utc>>, ExpandError> {
        let rrule = rule
            .parse::<RRule<Unvalidated>>()
            .map_err(|e| ExpandError(e.to_string()))?;

        let mut set = rrule
            .build(dtstart.with_timezone(&Tz::UTC))
            .map_err(|e| ExpandError(e.to_string()))?;

        if !exdates.is_empty() {
            set = set.set_exdates(
                exdates.iter().map(|dt| dt.with_timezone(&Tz::UTC)).collect(),
            );
        }

        // Both window boundaries are inclusive.
        let set = set
            .after(window.time_min.with_timezone(&Tz::UTC))
            .before(window.time_max.with_timezone(&Tz::UTC));

        let result = set.all(self.max_occurrences);
        if result.limited {
            warn!(
                rule = %rule,
                cap = self.max_occurrences,
                "recurrence enumeration hit the occurrence cap"
            );
        }

        Ok(result
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .collect())
    }
}
