//! Time types for digest composition.
//!
//! This module provides [`EventTime`] for event start/end instants (which may
//! be a specific datetime or an all-day date), [`DayWindow`] for the UTC span
//! of one local calendar day, and [`NotifySlot`] for the quantized "HH:mm"
//! notification time subscribers are matched against.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The notification grid: subscribers are matched every quarter hour.
pub const SLOT_MINUTES: u32 = 15;

/// The time of a calendar event.
///
/// Providers return either a concrete instant or a bare date (all-day
/// events). Instants are stored in UTC; the original wall-clock zone is
/// irrelevant once the event is on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    Instant(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::Instant(dt)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC instant for ordering.
    ///
    /// All-day events sort at midnight UTC of their date, which places them
    /// ahead of every timed event on the same day.
    pub fn to_utc(&self) -> DateTime<Utc> {
        match self {
            Self::Instant(dt) => *dt,
            Self::AllDay(date) => date
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
                .and_utc(),
        }
    }

    /// The date portion, in UTC for instants.
    pub fn date_naive(&self) -> NaiveDate {
        match self {
            Self::Instant(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc().cmp(&other.to_utc())
    }
}

/// The UTC span of one calendar day in a specific timezone.
///
/// A half-open interval `[start, end)`. An event belongs to the window when
/// it *starts* inside it; events that start inside and end after midnight
/// are still included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Local midnight at the start of the day, in UTC.
    pub start: DateTime<Utc>,
    /// Local midnight at the end of the day (exclusive), in UTC.
    pub end: DateTime<Utc>,
    /// The local date this window covers.
    pub date: NaiveDate,
}

impl DayWindow {
    /// Builds the window for `date` as observed in `tz`.
    ///
    /// On DST transitions where local midnight does not exist, the earliest
    /// valid instant of the day is used.
    pub fn for_date(date: NaiveDate, tz: Tz) -> Self {
        Self {
            start: local_midnight_utc(date, tz),
            end: local_midnight_utc(date + Duration::days(1), tz),
            date,
        }
    }

    /// The window for the day containing `now` in `tz`, shifted by
    /// `day_offset` days (0 = today, 1 = tomorrow).
    pub fn for_offset(now: DateTime<Utc>, tz: Tz, day_offset: i64) -> Self {
        let local_date = now.with_timezone(&tz).date_naive() + Duration::days(day_offset);
        Self::for_date(local_date, tz)
    }

    /// Whether an event starting at `start` belongs to this window.
    ///
    /// Timed events qualify by instant; events that run past midnight are
    /// included as long as they start before the day ends. All-day events
    /// qualify by date equality.
    pub fn includes_start(&self, start: &EventTime) -> bool {
        match start {
            EventTime::Instant(dt) => *dt >= self.start && *dt < self.end,
            EventTime::AllDay(date) => *date == self.date,
        }
    }
}

fn local_midnight_utc(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight was skipped by a DST jump; take the first existing hour.
        None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    }
}

/// A quantized "HH:mm" UTC notification time on the 15-minute grid.
///
/// Subscriptions store their notify time in this form; the scheduler floors
/// "now" with [`NotifySlot::floor_from_utc`] and matches by equality, so
/// both sides of the comparison use the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotifySlot {
    hour: u8,
    minute: u8,
}

impl NotifySlot {
    /// Creates a slot, flooring the minute to the grid.
    pub fn new(hour: u8, minute: u8) -> Result<Self, SlotError> {
        if hour > 23 || minute > 59 {
            return Err(SlotError::OutOfRange { hour, minute });
        }
        Ok(Self {
            hour,
            minute: minute - minute % SLOT_MINUTES as u8,
        })
    }

    /// Floors a UTC instant to its slot.
    pub fn floor_from_utc(now: DateTime<Utc>) -> Self {
        let minute = now.minute() - now.minute() % SLOT_MINUTES;
        Self {
            hour: now.hour() as u8,
            minute: minute as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for NotifySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for NotifySlot {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| SlotError::Malformed(s.to_string()))?;
        let hour: u8 = h.parse().map_err(|_| SlotError::Malformed(s.to_string()))?;
        let minute: u8 = m.parse().map_err(|_| SlotError::Malformed(s.to_string()))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for NotifySlot {
    type Error = SlotError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NotifySlot> for String {
    fn from(slot: NotifySlot) -> Self {
        slot.to_string()
    }
}

/// Error parsing or constructing a [`NotifySlot`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("notify time is not HH:mm: {0:?}")]
    Malformed(String),
    #[error("notify time out of range: {hour:02}:{minute:02}")]
    OutOfRange { hour: u8, minute: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn ordering_mixes_instants_and_all_day() {
            let all_day = EventTime::from_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
            let morning = EventTime::from_utc(utc(2025, 3, 10, 9, 0));

            assert!(all_day < morning);
        }

        #[test]
        fn utc_anchor_for_all_day() {
            let t = EventTime::from_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
            assert_eq!(t.to_utc(), utc(2025, 3, 10, 0, 0));
        }
    }

    mod day_window {
        use super::*;

        #[test]
        fn covers_local_day_in_utc() {
            // New York is UTC-4 on this date.
            let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
            let window = DayWindow::for_date(date, chrono_tz::America::New_York);

            assert_eq!(window.start, utc(2025, 6, 2, 4, 0));
            assert_eq!(window.end, utc(2025, 6, 3, 4, 0));
        }

        #[test]
        fn includes_event_spanning_midnight() {
            let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
            let window = DayWindow::for_date(date, chrono_tz::UTC);

            // Starts at 23:30, runs into the next day: still today's event.
            let late = EventTime::from_utc(utc(2025, 6, 2, 23, 30));
            assert!(window.includes_start(&late));

            // Starts exactly at next midnight: tomorrow's event.
            let next = EventTime::from_utc(utc(2025, 6, 3, 0, 0));
            assert!(!window.includes_start(&next));
        }

        #[test]
        fn all_day_matches_by_date() {
            let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
            let window = DayWindow::for_date(date, chrono_tz::Europe::Paris);

            assert!(window.includes_start(&EventTime::from_date(date)));
            assert!(!window.includes_start(&EventTime::from_date(
                NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()
            )));
        }

        #[test]
        fn offset_selects_tomorrow() {
            let now = utc(2025, 6, 2, 20, 0);
            let today = DayWindow::for_offset(now, chrono_tz::UTC, 0);
            let tomorrow = DayWindow::for_offset(now, chrono_tz::UTC, 1);

            assert_eq!(today.date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
            assert_eq!(tomorrow.date, NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
        }
    }

    mod notify_slot {
        use super::*;

        #[test]
        fn floors_to_grid() {
            assert_eq!(
                NotifySlot::floor_from_utc(utc(2025, 6, 2, 9, 7)).to_string(),
                "09:00"
            );
            assert_eq!(
                NotifySlot::floor_from_utc(utc(2025, 6, 2, 9, 15)).to_string(),
                "09:15"
            );
            assert_eq!(
                NotifySlot::floor_from_utc(utc(2025, 6, 2, 23, 59)).to_string(),
                "23:45"
            );
        }

        #[test]
        fn parse_floors_with_same_rule() {
            // A stored off-grid value floors the same way "now" does, so the
            // equality match still works.
            let stored: NotifySlot = "09:07".parse().unwrap();
            let now = NotifySlot::floor_from_utc(utc(2025, 6, 2, 9, 3));
            assert_eq!(stored, now);
        }

        #[test]
        fn parse_rejects_garbage() {
            assert!("9am".parse::<NotifySlot>().is_err());
            assert!("25:00".parse::<NotifySlot>().is_err());
            assert!("09:60".parse::<NotifySlot>().is_err());
            assert!("".parse::<NotifySlot>().is_err());
        }

        #[test]
        fn display_zero_pads() {
            let slot = NotifySlot::new(7, 0).unwrap();
            assert_eq!(slot.to_string(), "07:00");
        }

        #[test]
        fn serde_as_string() {
            let slot: NotifySlot = serde_json::from_str("\"14:30\"").unwrap();
            assert_eq!(slot, NotifySlot::new(14, 30).unwrap());
            assert_eq!(serde_json::to_string(&slot).unwrap(), "\"14:30\"");
        }
    }
}
