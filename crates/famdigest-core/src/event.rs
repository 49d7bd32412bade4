//! The canonical digest event and the chronological merge.
//!
//! A [`DigestEvent`] is the provider-independent representation of one
//! calendar entry for one compose cycle. It is never persisted; it exists
//! between fetch and compose.

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// A normalized calendar event on the digest timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEvent {
    /// When the event starts.
    pub start: EventTime,
    /// When the event ends. Equals `start` for point events.
    pub end: EventTime,
    /// The event title.
    pub title: String,
    /// Which calendar the event came from (display name, for attribution).
    pub calendar_source: String,
}

impl DigestEvent {
    pub fn new(
        start: EventTime,
        end: EventTime,
        title: impl Into<String>,
        calendar_source: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            title: title.into(),
            calendar_source: calendar_source.into(),
        }
    }

    /// A zero-duration event, used when the provider omits the end time.
    pub fn point(start: EventTime, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(start, start, title, source)
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end.to_utc() - self.start.to_utc()).num_minutes()
    }
}

/// Merges per-calendar event sequences into one chronological timeline.
///
/// The output is sorted ascending by start instant; ties keep the original
/// fetch order (input sequence order, then position within the sequence).
/// Nothing is deduplicated: if two providers return the same underlying
/// event, both appear in the timeline. Output length always equals the sum
/// of the input lengths.
pub fn merge_timelines(per_calendar: Vec<Vec<DigestEvent>>) -> Vec<DigestEvent> {
    let mut merged: Vec<DigestEvent> = per_calendar.into_iter().flatten().collect();
    // Stable sort preserves fetch order between equal start instants.
    merged.sort_by_key(|event| event.start.to_utc());
    merged
}
