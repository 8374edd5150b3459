//! Calendar arithmetic: quota periods, weekly windows and business days.

use crate::error::{Error, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A (year, month) pair scoping quota aggregates and items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    first: NaiveDate,
}

impl Period {
    /// Create a period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the month is outside `1..=12` or the
    /// year is not representable.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Self { first })
            .ok_or_else(|| Error::Validation(format!("invalid period {year}-{month:02}")))
    }

    /// The period a date falls in.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date - Days::new(u64::from(date.day0())),
        }
    }

    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.first.year()
    }

    /// Calendar month, `1..=12`.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.first.month()
    }

    /// First day of the month.
    #[must_use]
    pub const fn first_day(&self) -> NaiveDate {
        self.first
    }

    /// Last day of the month.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        let mut day = self.first;
        while let Some(next) = day.succ_opt() {
            if next.month() != self.first.month() {
                break;
            }
            day = next;
        }
        day
    }

    /// Whether `date` falls inside this period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    /// Partition the month into Monday–Sunday windows clipped to the month.
    ///
    /// The window count is the period's "total weeks". The last window is
    /// flagged regional.
    #[must_use]
    pub fn weekly_windows(&self) -> Vec<WeekWindow> {
        let last = self.last_day();
        let mut windows = Vec::with_capacity(6);
        let mut start = self.first;
        let mut number = 1;

        loop {
            let to_sunday = 6 - start.weekday().num_days_from_monday();
            let end = (start + Days::new(u64::from(to_sunday))).min(last);
            windows.push(WeekWindow {
                number,
                from: start,
                to: end,
                regional: false,
            });
            if end >= last {
                break;
            }
            start = end + Days::new(1);
            number += 1;
        }

        if let Some(window) = windows.last_mut() {
            window.regional = true;
        }
        windows
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year(), self.month())
    }
}

/// One weekly entitlement window inside a period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    /// 1-based week number within the month
    pub number: u32,
    /// First day (inclusive)
    pub from: NaiveDate,
    /// Last day (inclusive)
    pub to: NaiveDate,
    /// The month's closing window, reserved for regional travel
    pub regional: bool,
}

impl WeekWindow {
    /// Human label, e.g. `SEMANA 2` or `SEMANA 5 (REGIONAL)`.
    #[must_use]
    pub fn label(&self) -> String {
        if self.regional {
            format!("SEMANA {} (REGIONAL)", self.number)
        } else {
            format!("SEMANA {}", self.number)
        }
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Add `days` business days (Monday–Friday) to `start`.
///
/// The start date itself is never counted.
#[must_use]
pub fn add_business_days(start: NaiveDate, days: u32) -> NaiveDate {
    let mut date = start;
    let mut counted = 0;
    while counted < days {
        date = date + Days::new(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            counted += 1;
        }
    }
    date
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(matches!(Period::new(2025, 13), Err(Error::Validation(_))));
        assert!(matches!(Period::new(2025, 0), Err(Error::Validation(_))));
    }

    #[test]
    fn thirty_day_month_starting_wednesday() {
        // April 2026 starts on a Wednesday
        let period = Period::new(2026, 4).unwrap();
        assert_eq!(period.first_day().weekday(), Weekday::Wed);

        let windows = period.weekly_windows();
        let bounds: Vec<_> = windows.iter().map(|w| (w.from.day(), w.to.day())).collect();
        assert_eq!(bounds, vec![(1, 5), (6, 12), (13, 19), (20, 26), (27, 30)]);
        assert_eq!(windows[0].label(), "SEMANA 1");
        assert_eq!(windows[4].label(), "SEMANA 5 (REGIONAL)");
    }

    #[test]
    fn february_starting_monday_has_four_full_weeks() {
        // February 2027 starts on Monday and has 28 days
        let windows = Period::new(2027, 2).unwrap().weekly_windows();
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| (w.to - w.from).num_days() == 6));
    }

    #[test]
    fn month_ending_on_monday_gets_single_day_window() {
        // March 2025: starts Saturday, ends Monday the 31st
        let windows = Period::new(2025, 3).unwrap().weekly_windows();
        assert_eq!(windows.first().map(|w| (w.from.day(), w.to.day())), Some((1, 2)));
        assert_eq!(windows.last().map(|w| (w.from.day(), w.to.day())), Some((31, 31)));
        assert_eq!(windows.len(), 6);
    }

    #[test]
    fn containing_period_and_last_day() {
        let period = Period::containing(date(2024, 2, 17));
        assert_eq!(period, Period::new(2024, 2).unwrap());
        assert_eq!(period.last_day(), date(2024, 2, 29));
        assert_eq!(period.to_string(), "2024-02");
    }

    #[test]
    fn business_days_skip_weekends() {
        // Friday 2025-01-03 + 8 business days = Wednesday 2025-01-15
        assert_eq!(add_business_days(date(2025, 1, 3), 8), date(2025, 1, 15));
        // Saturday start counts from Monday
        assert_eq!(add_business_days(date(2025, 1, 4), 1), date(2025, 1, 6));
    }

    proptest! {
        #[test]
        fn windows_tile_the_month_exactly(year in 2000i32..2100, month in 1u32..=12) {
            let period = Period::new(year, month).unwrap();
            let windows = period.weekly_windows();

            prop_assert_eq!(windows.first().map(|w| w.from), Some(period.first_day()));
            prop_assert_eq!(windows.last().map(|w| w.to), Some(period.last_day()));
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[0].to + Days::new(1), pair[1].from);
                prop_assert_eq!(pair[1].from.weekday(), Weekday::Mon);
            }
            for window in &windows {
                prop_assert!(window.from <= window.to);
                prop_assert!((window.to - window.from).num_days() <= 6);
            }
            prop_assert!((4..=6).contains(&windows.len()));
            prop_assert_eq!(windows.iter().filter(|w| w.regional).count(), 1);
        }

        #[test]
        fn business_day_deadline_never_lands_on_weekend(offset in 0u64..3650, days in 1u32..20) {
            let start = date(2020, 1, 1) + Days::new(offset);
            let deadline = add_business_days(start, days);
            prop_assert!(!matches!(deadline.weekday(), Weekday::Sat | Weekday::Sun));
            prop_assert!(deadline > start);
        }
    }
}
