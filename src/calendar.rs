//! Calendar systems and timestamps found in climate-model time coordinates
//!
//! Model output often uses calendars with fixed month lengths (365-day "noleap",
//! 360-day, ...). A [`Timestamp`] is either a date on such a calendar or an
//! ordinary Gregorian date-time, and the variant decides how it is normalized.

use crate::errors::{ClimTrendError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: i64 = 86_400;

const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Calendar identifiers from the CF conventions `calendar` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalendarKind {
    /// Mixed Julian/Gregorian (`standard`, `gregorian`)
    #[default]
    Standard,
    /// Gregorian rules extended before 1582
    ProlepticGregorian,
    /// Every year has 365 days (`noleap`, `365_day`)
    NoLeap,
    /// Every year has 366 days (`all_leap`, `366_day`)
    AllLeap,
    /// Twelve 30-day months
    Day360,
    /// Leap year every fourth year
    Julian,
}

impl CalendarKind {
    /// Parse the optional `calendar` attribute of a time coordinate.
    ///
    /// An absent attribute means the CF default, `standard`.
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::UnsupportedCalendar`] for unknown names.
    pub fn from_attribute(attr: Option<&str>) -> Result<Self> {
        match attr {
            Some(name) => name.parse(),
            None => Ok(Self::Standard),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ProlepticGregorian => "proleptic_gregorian",
            Self::NoLeap => "noleap",
            Self::AllLeap => "all_leap",
            Self::Day360 => "360_day",
            Self::Julian => "julian",
        }
    }

    /// Whether dates on this calendar are represented as ordinary date-times
    #[must_use]
    pub const fn is_standard(self) -> bool {
        matches!(self, Self::Standard | Self::ProlepticGregorian)
    }

    #[must_use]
    pub const fn is_leap_year(self, year: i32) -> bool {
        match self {
            Self::Standard | Self::ProlepticGregorian => {
                (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
            }
            Self::Julian => year % 4 == 0,
            Self::AllLeap => true,
            Self::NoLeap | Self::Day360 => false,
        }
    }

    #[must_use]
    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        if self == Self::Day360 {
            return 30;
        }
        let base = MONTH_DAYS[(month.clamp(1, 12) - 1) as usize];
        if month == 2 && self.is_leap_year(year) {
            base + 1
        } else {
            base
        }
    }

    #[must_use]
    pub const fn days_in_year(self, year: i32) -> u32 {
        match self {
            Self::Day360 => 360,
            _ if self.is_leap_year(year) => 366,
            _ => 365,
        }
    }

    /// Length of the repeating leap cycle as (years, days)
    const fn cycle(self) -> (i32, i64) {
        match self {
            Self::Standard | Self::ProlepticGregorian => (400, 146_097),
            Self::Julian => (4, 1_461),
            Self::AllLeap => (1, 366),
            Self::NoLeap => (1, 365),
            Self::Day360 => (1, 360),
        }
    }

    /// Days from 0000-01-01 to the first day of `year`; never overflows for an `i32` year
    #[must_use]
    pub fn days_before_year(self, year: i32) -> i64 {
        let (cycle_years, cycle_days) = self.cycle();
        let cycles = year.div_euclid(cycle_years);
        let first = cycles * cycle_years;
        let partial: i64 = (first..year)
            .map(|y| i64::from(self.days_in_year(y)))
            .sum();
        i64::from(cycles) * cycle_days + partial
    }

    /// Split a day number (days since 0000-01-01) into year and zero-based day of year.
    ///
    /// Returns `None` when the year does not fit in an `i32`.
    #[must_use]
    pub fn year_and_day(self, day_number: i64) -> Option<(i32, u32)> {
        let (cycle_years, cycle_days) = self.cycle();
        let cycles = i32::try_from(day_number.div_euclid(cycle_days)).ok()?;
        let mut remaining = day_number.rem_euclid(cycle_days);
        let mut year = cycles.checked_mul(cycle_years)?;
        loop {
            let len = i64::from(self.days_in_year(year));
            if remaining < len {
                return Some((year, u32::try_from(remaining).ok()?));
            }
            remaining -= len;
            year = year.checked_add(1)?;
        }
    }

    /// Month and day of month for a zero-based day of year
    #[must_use]
    pub fn month_and_day(self, year: i32, day_of_year: u32) -> (u32, u32) {
        let mut remaining = day_of_year;
        for month in 1..=12 {
            let len = self.days_in_month(year, month);
            if remaining < len {
                return (month, remaining + 1);
            }
            remaining -= len;
        }
        (12, self.days_in_month(year, 12))
    }

    /// Zero-based day of year for a month and day of month
    #[must_use]
    pub fn day_of_year(self, year: i32, month: u32, day: u32) -> u32 {
        let before: u32 = (1..month).map(|m| self.days_in_month(year, m)).sum();
        before + day.saturating_sub(1)
    }
}

impl FromStr for CalendarKind {
    type Err = ClimTrendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Self::Standard),
            "proleptic_gregorian" => Ok(Self::ProlepticGregorian),
            "noleap" | "no_leap" | "365_day" => Ok(Self::NoLeap),
            "all_leap" | "366_day" => Ok(Self::AllLeap),
            "360_day" => Ok(Self::Day360),
            "julian" => Ok(Self::Julian),
            _ => Err(ClimTrendError::UnsupportedCalendar {
                calendar: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date-time on an explicit (usually non-standard) model calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfDatetime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub calendar: CalendarKind,
}

impl CfDatetime {
    /// Midnight on the given date
    #[must_use]
    pub const fn new(year: i32, month: u32, day: u32, calendar: CalendarKind) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            calendar,
        }
    }

    #[must_use]
    pub const fn with_time(mut self, hour: u32, minute: u32, second: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    /// Days since 0000-01-01 on this date's calendar
    #[must_use]
    pub fn day_number(&self) -> i64 {
        self.calendar.days_before_year(self.year)
            + i64::from(self.calendar.day_of_year(self.year, self.month, self.day))
    }

    #[must_use]
    pub const fn seconds_of_day(&self) -> i64 {
        (self.hour * 3600 + self.minute * 60 + self.second) as i64
    }

    /// Rebuild a date from a day number and seconds past midnight, `None` past the `i32` year range
    #[must_use]
    pub fn from_day_number(
        day_number: i64,
        seconds_of_day: i64,
        calendar: CalendarKind,
    ) -> Option<Self> {
        let (year, day_of_year) = calendar.year_and_day(day_number)?;
        let (month, day) = calendar.month_and_day(year, day_of_year);
        let secs = seconds_of_day.rem_euclid(SECONDS_PER_DAY) as u32;
        Some(
            Self::new(year, month, day, calendar).with_time(
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
            ),
        )
    }

    /// Shift by a signed number of seconds, respecting the calendar's month lengths.
    ///
    /// Returns `None` if the result falls outside the `i32` year range.
    #[must_use]
    pub fn add_seconds(&self, seconds: i64) -> Option<Self> {
        let total = self.seconds_of_day().checked_add(seconds)?;
        let days = self
            .day_number()
            .checked_add(total.div_euclid(SECONDS_PER_DAY))?;
        Self::from_day_number(days, total.rem_euclid(SECONDS_PER_DAY), self.calendar)
    }
}

/// One value of a time coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Date on a model calendar with its own month and year lengths
    Calendar(CfDatetime),
    /// Ordinary Gregorian date-time
    Standard(NaiveDateTime),
}

impl Timestamp {
    #[must_use]
    pub fn year(&self) -> i32 {
        match self {
            Self::Calendar(d) => d.year,
            Self::Standard(dt) => dt.year(),
        }
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        match self {
            Self::Calendar(d) => d.month,
            Self::Standard(dt) => dt.month(),
        }
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        match self {
            Self::Calendar(d) => d.day,
            Self::Standard(dt) => dt.day(),
        }
    }

    #[must_use]
    pub fn calendar(&self) -> CalendarKind {
        match self {
            Self::Calendar(d) => d.calendar,
            Self::Standard(_) => CalendarKind::Standard,
        }
    }

    /// Chronological ordering key, valid between timestamps of the same calendar
    #[must_use]
    pub fn sort_key(&self) -> (i32, u32, u32, u32, u32, u32) {
        match self {
            Self::Calendar(d) => (d.year, d.month, d.day, d.hour, d.minute, d.second),
            Self::Standard(dt) => (
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second(),
            ),
        }
    }

    /// `YYYY-MM-DD`
    #[must_use]
    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (_, _, _, hour, minute, second) = self.sort_key();
        write!(
            f,
            "{} {:02}:{:02}:{:02} ({})",
            self.date_string(),
            hour,
            minute,
            second,
            self.calendar()
        )
    }
}
