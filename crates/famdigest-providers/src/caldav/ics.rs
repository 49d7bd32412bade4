//! iCalendar (RFC 5545) parsing into [`RawEvent`].

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event};
use tracing::warn;

use crate::raw_event::{RawEvent, RawEventTime};

/// Parses ICS content and extracts its VEVENTs.
///
/// Recurring events are already expanded by the server when the data comes
/// from a time-range calendar-query. Unparseable content yields an empty
/// list rather than an error so one corrupt object cannot hide a whole
/// calendar.
pub fn parse_ics_content(ics: &str) -> Vec<RawEvent> {
    let calendar = match ics.parse::<Calendar>() {
        Ok(cal) => cal,
        Err(e) => {
            warn!(error = %e, "failed to parse ICS content");
            return Vec::new();
        }
    };

    calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => parse_event(event),
            _ => None,
        })
        .collect()
}

fn parse_event(event: &Event) -> Option<RawEvent> {
    let uid = event.get_uid()?;
    let start = convert_date_time(event.get_start()?);

    let mut raw = RawEvent::new(uid, start);

    if let Some(end) = event.get_end() {
        raw = raw.with_end(convert_date_time(end));
    }
    if let Some(summary) = event.get_summary() {
        raw = raw.with_summary(summary);
    }
    if let Some(status) = event.get_status() {
        raw = raw.with_status(format!("{status:?}"));
    }

    Some(raw)
}

/// Resolves an iCalendar time to an absolute instant or date.
///
/// Floating times (no zone) are interpreted as UTC. A TZID is resolved
/// through chrono-tz; unknown zone names fall back to UTC interpretation.
fn convert_date_time(dt: DatePerhapsTime) -> RawEventTime {
    match dt {
        DatePerhapsTime::Date(date) => RawEventTime::from_date(date),
        DatePerhapsTime::DateTime(cdt) => {
            let utc_dt = match cdt {
                CalendarDateTime::Utc(dt) => dt,
                CalendarDateTime::Floating(naive) => Utc.from_utc_datetime(&naive),
                CalendarDateTime::WithTimezone { date_time, tzid } => match Tz::from_str(&tzid) {
                    Ok(tz) => tz
                        .from_local_datetime(&date_time)
                        .earliest()
                        .map(|local| local.with_timezone(&Utc))
                        .unwrap_or_else(|| Utc.from_utc_datetime(&date_time)),
                    Err(_) => {
                        warn!(tzid = %tzid, "unknown TZID, treating as UTC");
                        Utc.from_utc_datetime(&date_time)
                    }
                },
            };
            RawEventTime::from_datetime(utc_dt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_timed_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:event1@icloud.com\r\n\
                   DTSTART:20250602T170000Z\r\n\
                   DTEND:20250602T180000Z\r\n\
                   SUMMARY:Piano lesson\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";

        let events = parse_ics_content(ics);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].external_id, "event1@icloud.com");
        assert_eq!(events[0].effective_title(), "Piano lesson");
        match events[0].start {
            RawEventTime::DateTime(dt) => assert_eq!(dt.hour(), 17),
            RawEventTime::Date(_) => panic!("expected a timed event"),
        }
    }

    #[test]
    fn parses_all_day_event() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:event2@icloud.com\r\n\
                   DTSTART;VALUE=DATE:20250602\r\n\
                   DTEND;VALUE=DATE:20250603\r\n\
                   SUMMARY:School holiday\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";

        let events = parse_ics_content(ics);

        assert_eq!(events.len(), 1);
        assert!(events[0].start.is_all_day());
    }

    #[test]
    fn event_without_end_is_kept() {
        let ics = "BEGIN:VCALENDAR\r\n\
                   VERSION:2.0\r\n\
                   BEGIN:VEVENT\r\n\
                   UID:event3@icloud.com\r\n\
                   DTSTART:20250602T090000Z\r\n\
                   SUMMARY:Reminder\r\n\
                   END:VEVENT\r\n\
                   END:VCALENDAR\r\n";

        let events = parse_ics_content(ics);

        assert_eq!(events.len(), 1);
    }

    #[test]
    fn garbage_yields_empty_list() {
        assert!(parse_ics_content("not an ics payload").is_empty());
    }
}
