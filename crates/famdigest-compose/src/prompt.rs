//! Structured digest request construction.
//!
//! The summarization model receives the merged timeline as structured
//! JSON, never as pre-rendered prose, so the prompt has unambiguous input
//! to work from.

use chrono::NaiveDate;
use famdigest_core::{DigestEvent, EventTime};
use serde::Serialize;

/// The request handed to the summarization endpoint for one recipient.
#[derive(Debug, Clone, Serialize)]
pub struct DigestRequest {
    /// Who the digest is addressed to.
    pub recipient_name: String,
    /// Whose calendars it covers.
    pub owner_name: String,
    /// The local date the digest describes.
    pub date: NaiveDate,
    /// The merged timeline, in chronological order.
    pub events: Vec<EventEntry>,
}

/// One event as serialized into the request.
#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    /// RFC 3339 instant, or `null` for all-day events.
    pub start: Option<String>,
    pub end: Option<String>,
    /// True when the event has no specific time.
    pub all_day: bool,
    pub title: String,
    /// Which calendar it came from.
    pub calendar: String,
}

impl DigestRequest {
    pub fn new(
        recipient_name: impl Into<String>,
        owner_name: impl Into<String>,
        date: NaiveDate,
        events: &[DigestEvent],
    ) -> Self {
        Self {
            recipient_name: recipient_name.into(),
            owner_name: owner_name.into(),
            date,
            events: events.iter().map(EventEntry::from_event).collect(),
        }
    }
}

impl EventEntry {
    fn from_event(event: &DigestEvent) -> Self {
        let (start, end, all_day) = match (&event.start, &event.end) {
            (EventTime::AllDay(_), _) => (None, None, true),
            (EventTime::Instant(start), end) => (
                Some(start.to_rfc3339()),
                Some(end.to_utc().to_rfc3339()),
                false,
            ),
        };

        Self {
            start,
            end,
            all_day,
            title: event.title.clone(),
            calendar: event.calendar_source.clone(),
        }
    }
}
