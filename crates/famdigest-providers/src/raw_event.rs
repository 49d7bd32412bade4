//! Raw event type as returned by calendar providers.
//!
//! A [`RawEvent`] carries the fields the digest needs before normalization:
//! identity, title, start, and an optional end. Adapters are responsible
//! for converting provider-local wall-clock representations into absolute
//! instants (or bare dates for all-day entries) before constructing one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The time specification for a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawEventTime {
    /// A specific instant, already resolved to UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date.
    Date(NaiveDate),
}

impl RawEventTime {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// A calendar event as fetched from a provider, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Provider-native identifier for the event.
    pub external_id: String,
    /// When the event starts.
    pub start: RawEventTime,
    /// When the event ends. Providers may omit this entirely.
    pub end: Option<RawEventTime>,
    /// The event title/summary.
    pub summary: Option<String>,
    /// Provider status string (e.g., "confirmed", "cancelled").
    pub status: Option<String>,
}

impl RawEvent {
    pub fn new(external_id: impl Into<String>, start: RawEventTime) -> Self {
        Self {
            external_id: external_id.into(),
            start,
            end: None,
            summary: None,
            status: None,
        }
    }

    /// Returns the title, falling back to "(No title)" when absent or blank.
    pub fn effective_title(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("(No title)")
    }

    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"))
    }

    pub fn with_end(mut self, end: RawEventTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}
