//! Raw event to [`DigestEvent`] conversion.
//!
//! Normalization filters out cancelled entries and events outside the day
//! window, then maps what remains onto the canonical timeline shape. An
//! event with no end time becomes a zero-duration point event.

use famdigest_core::{DayWindow, DigestEvent, EventTime};

use crate::raw_event::{RawEvent, RawEventTime};

/// Converts one calendar's raw events into digest events.
///
/// `source_label` is the calendar's display name, carried through for
/// attribution in the composed digest. Events qualify when they start
/// inside `window`; an event that starts before midnight and ends the next
/// day is kept.
pub fn normalize_events(
    raw_events: &[RawEvent],
    source_label: &str,
    window: &DayWindow,
) -> Vec<DigestEvent> {
    raw_events
        .iter()
        .filter(|raw| !raw.is_cancelled())
        .filter_map(|raw| normalize_event(raw, source_label, window))
        .collect()
}

fn normalize_event(raw: &RawEvent, source_label: &str, window: &DayWindow) -> Option<DigestEvent> {
    let start = convert_time(&raw.start);
    if !window.includes_start(&start) {
        return None;
    }

    let end = match &raw.end {
        Some(end) => convert_time(end),
        // No end time: a zero-duration point event.
        None => start,
    };

    Some(DigestEvent::new(
        start,
        end,
        raw.effective_title(),
        source_label,
    ))
}

fn convert_time(raw: &RawEventTime) -> EventTime {
    match raw {
        RawEventTime::DateTime(dt) => EventTime::from_utc(*dt),
        RawEventTime::Date(date) => EventTime::from_date(*date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, mi, 0).unwrap()
    }

    fn window() -> DayWindow {
        DayWindow::for_date(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), chrono_tz::UTC)
    }

    fn timed(id: &str, start: DateTime<Utc>) -> RawEvent {
        RawEvent::new(id, RawEventTime::from_datetime(start))
    }

    #[test]
    fn maps_fields_through() {
        let raw = timed("evt-1", utc(2, 9, 0))
            .with_end(RawEventTime::from_datetime(utc(2, 10, 0)))
            .with_summary("Swim lesson");

        let events = normalize_events(&[raw], "Family", &window());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Swim lesson");
        assert_eq!(events[0].calendar_source, "Family");
        assert_eq!(events[0].duration_minutes(), 60);
    }

    #[test]
    fn missing_end_becomes_point_event() {
        let raw = timed("evt-1", utc(2, 9, 0)).with_summary("Reminder");

        let events = normalize_events(&[raw], "Family", &window());

        assert_eq!(events[0].start, events[0].end);
        assert_eq!(events[0].duration_minutes(), 0);
    }

    #[test]
    fn cancelled_events_are_dropped() {
        let raw = timed("evt-1", utc(2, 9, 0)).with_status("cancelled");
        assert!(normalize_events(&[raw], "Family", &window()).is_empty());
    }

    #[test]
    fn events_outside_window_are_dropped() {
        let yesterday = timed("evt-1", utc(1, 23, 0));
        let tomorrow = timed("evt-2", utc(3, 1, 0));
        let today = timed("evt-3", utc(2, 12, 0));

        let events = normalize_events(&[yesterday, tomorrow, today], "Family", &window());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start.to_utc(), utc(2, 12, 0));
    }

    #[test]
    fn midnight_spanning_event_is_kept() {
        let late = timed("evt-1", utc(2, 23, 30))
            .with_end(RawEventTime::from_datetime(utc(3, 1, 0)))
            .with_summary("Red-eye flight");

        let events = normalize_events(&[late], "Travel", &window());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Red-eye flight");
    }

    #[test]
    fn all_day_event_matches_window_date() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let all_day = RawEvent::new("evt-1", RawEventTime::from_date(date)).with_summary("Holiday");

        let events = normalize_events(&[all_day], "Family", &window());

        assert_eq!(events.len(), 1);
        assert!(events[0].is_all_day());
    }
}
