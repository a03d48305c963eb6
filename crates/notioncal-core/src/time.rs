//! Time types for calendar events.
//!
//! [`EventTime`] is either a zoned instant or an all-day date, and
//! [`DateWindow`] is the optional range a view queries.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::view::{DaySpan, ViewConfig};

/// The start or end of a calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// A specific instant, carried in the zone it should be rendered in.
    DateTime(DateTime<Tz>),
    /// A whole day with no time component.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates an instant, converted into `tz`.
    pub fn at<Z: TimeZone>(dt: DateTime<Z>, tz: Tz) -> Self {
        Self::DateTime(dt.with_timezone(&tz))
    }

    /// Creates an all-day value.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Returns the instant if this is a `DateTime` variant.
    pub fn as_datetime(&self) -> Option<&DateTime<Tz>> {
        match self {
            Self::DateTime(dt) => Some(dt),
            Self::AllDay(_) => None,
        }
    }

    /// Returns the calendar date in the value's own zone.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(d) => *d,
        }
    }

    /// Returns a UTC instant usable for ordering.
    ///
    /// All-day values resolve to local midnight in `tz`. Across a DST gap the
    /// earliest valid local time is used, and the day's UTC midnight when no
    /// local mapping exists at all.
    pub fn to_utc(&self, tz: &Tz) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => dt.with_timezone(&Utc),
            Self::AllDay(d) => {
                let midnight = d.and_time(NaiveTime::MIN);
                tz.from_local_datetime(&midnight)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| midnight.and_utc())
            }
        }
    }
}

/// The day after `date`, saturating at the last representable date.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

/// The query range of a view. `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateWindow {
    /// A window with no bounds.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Computes `now - lookback .. now + lookahead`.
    ///
    /// A bound that would overflow the representable range is treated as
    /// unbounded.
    pub fn around(now: DateTime<Utc>, lookback: DaySpan, lookahead: DaySpan) -> Self {
        let start = lookback
            .days()
            .and_then(|d| now.checked_sub_signed(Duration::days(i64::from(d))));
        let end = lookahead
            .days()
            .and_then(|d| now.checked_add_signed(Duration::days(i64::from(d))));
        Self { start, end }
    }

    /// Computes the window for a view at `now`.
    pub fn for_view(view: &ViewConfig, now: DateTime<Utc>) -> Self {
        Self::around(now, view.lookback, view.lookahead)
    }

    /// Returns `true` if neither side is bounded.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Checks if an instant falls inside the window, bounds inclusive.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| dt >= s) && self.end.is_none_or(|e| dt <= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn window_around_now() {
        let now = utc(2024, 3, 10, 12);
        let window = DateWindow::around(now, DaySpan::Days(7), DaySpan::Days(30));
        assert_eq!(window.start, Some(utc(2024, 3, 3, 12)));
        assert_eq!(window.end, Some(utc(2024, 4, 9, 12)));
        assert!(window.contains(now));
        assert!(!window.contains(utc(2024, 3, 1, 0)));
    }

    #[test]
    fn half_open_window() {
        let now = utc(2024, 3, 10, 12);
        let window = DateWindow::around(now, DaySpan::Unbounded, DaySpan::Days(1));
        assert!(window.start.is_none());
        assert!(window.contains(utc(1990, 1, 1, 0)));
        assert!(!window.contains(utc(2024, 3, 12, 0)));
    }

    #[test]
    fn unbounded_window() {
        let window = DateWindow::around(utc(2024, 1, 1, 0), DaySpan::Unbounded, DaySpan::Unbounded);
        assert!(window.is_unbounded());
        assert_eq!(window, DateWindow::unbounded());
    }

    #[test]
    fn zero_day_window_is_a_point() {
        let now = utc(2024, 3, 10, 12);
        let window = DateWindow::around(now, DaySpan::Days(0), DaySpan::Days(0));
        assert_eq!(window.start, Some(now));
        assert_eq!(window.end, Some(now));
    }

    #[test]
    fn huge_span_saturates_to_unbounded() {
        let now = utc(2024, 3, 10, 12);
        let window = DateWindow::around(now, DaySpan::Days(u32::MAX), DaySpan::Days(u32::MAX));
        assert!(window.is_unbounded());
    }

    #[test]
    fn all_day_sorts_at_local_midnight() {
        let berlin = chrono_tz::Europe::Berlin;
        let day = EventTime::from_date(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(day.to_utc(&berlin), utc(2024, 6, 30, 22));
        assert_eq!(day.to_utc(&Tz::UTC), utc(2024, 7, 1, 0));
    }

    #[test]
    fn instant_keeps_its_zone() {
        let berlin = chrono_tz::Europe::Berlin;
        let time = EventTime::at(utc(2024, 1, 15, 23), berlin);
        assert_eq!(time.date(), NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(time.to_utc(&Tz::UTC), utc(2024, 1, 15, 23));
        assert!(!time.is_all_day());
    }
}
