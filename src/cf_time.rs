//! Decoding of CF-convention time coordinates
//!
//! NetCDF time variables store numeric offsets together with a `units` attribute
//! such as `"days since 1850-01-01 00:00:00"` and an optional `calendar`
//! attribute. This module turns those offsets into [`Timestamp`]s.

use crate::calendar::{CalendarKind, CfDatetime, Timestamp};
use crate::errors::{ClimTrendError, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Offset unit of a CF time coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    #[must_use]
    pub const fn seconds(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3_600.0,
            Self::Days => 86_400.0,
        }
    }

    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => Some(Self::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(Self::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(Self::Hours),
            "days" | "day" | "d" => Some(Self::Days),
            _ => None,
        }
    }
}

/// Reference epoch of a CF units string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: f64,
}

/// Parsed `"<unit> since <reference>"` string
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub reference: ReferenceDate,
}

impl CfTimeUnits {
    /// Parse a CF time units string.
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::InvalidTimeUnits`] if the string is not of the
    /// form `<unit> since <date>[ <time>]`.
    pub fn parse(units: &str) -> Result<Self> {
        let invalid = || ClimTrendError::InvalidTimeUnits {
            units: units.to_string(),
        };

        let lower = units.to_ascii_lowercase();
        let split_at = lower.find(" since ").ok_or_else(invalid)?;
        let unit = TimeUnit::parse(units[..split_at].trim()).ok_or_else(invalid)?;
        let reference = parse_reference(units[split_at + " since ".len()..].trim())
            .ok_or_else(invalid)?;

        Ok(Self { unit, reference })
    }
}

fn parse_reference(text: &str) -> Option<ReferenceDate> {
    let text = text.trim_end_matches('Z').trim_end_matches("UTC").trim();
    let (date_part, time_part) = match text.find(|c: char| c == 'T' || c == ' ') {
        Some(pos) => (&text[..pos], Some(text[pos + 1..].trim())),
        None => (text, None),
    };

    let (negative, date_body) = match date_part.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, date_part),
    };
    let mut fields = date_body.split('-');
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u32 = fields.next().map_or(Some(1), |m| m.parse().ok())?;
    let day: u32 = fields.next().map_or(Some(1), |d| d.parse().ok())?;
    if fields.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let (mut hour, mut minute, mut second) = (0, 0, 0.0);
    if let Some(time) = time_part {
        // Anything after the clock time is a UTC offset, which CF files leave at zero
        let clock = time.split_whitespace().next().unwrap_or("");
        let clock = clock.split(|c: char| c == '+' || c == 'Z').next().unwrap_or("");
        if !clock.is_empty() {
            let mut parts = clock.split(':');
            hour = parts.next()?.parse().ok()?;
            minute = parts.next().map_or(Some(0), |m| m.parse().ok())?;
            second = parts.next().map_or(Some(0.0), |s| s.parse().ok())?;
            if hour > 23 || minute > 59 || !(0.0..61.0).contains(&second) {
                return None;
            }
        }
    }

    Some(ReferenceDate {
        year: if negative { -year } else { year },
        month,
        day,
        hour,
        minute,
        second,
    })
}

/// Decode numeric offsets into timestamps.
///
/// Standard and proleptic Gregorian calendars produce [`Timestamp::Standard`]
/// values computed with chrono (proleptic rules throughout). Every other calendar
/// produces [`Timestamp::Calendar`] values using that calendar's month lengths.
///
/// # Errors
///
/// Returns [`ClimTrendError::InvalidTimeUnits`] for unparsable units or a
/// reference date that does not exist on `calendar`, and
/// [`ClimTrendError::InvalidTimeValue`] for non-finite or out-of-range offsets.
pub fn decode(values: &[f64], units: &str, calendar: CalendarKind) -> Result<Vec<Timestamp>> {
    let parsed = CfTimeUnits::parse(units)?;
    let reference = parsed.reference;
    let invalid_units = || ClimTrendError::InvalidTimeUnits {
        units: units.to_string(),
    };

    if reference.day > calendar.days_in_month(reference.year, reference.month) {
        return Err(invalid_units());
    }

    let offsets = values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let seconds = value * parsed.unit.seconds() + reference.second;
            if seconds.is_finite() && seconds.abs() < i64::MAX as f64 {
                Ok(seconds.round() as i64)
            } else {
                Err(ClimTrendError::InvalidTimeValue { index })
            }
        })
        .collect::<Result<Vec<i64>>>()?;

    if calendar.is_standard() {
        let epoch = NaiveDate::from_ymd_opt(reference.year, reference.month, reference.day)
            .and_then(|d| d.and_hms_opt(reference.hour, reference.minute, 0))
            .ok_or_else(invalid_units)?;
        offsets
            .iter()
            .enumerate()
            .map(|(index, &secs)| {
                add_seconds(epoch, secs)
                    .map(Timestamp::Standard)
                    .ok_or(ClimTrendError::InvalidTimeValue { index })
            })
            .collect()
    } else {
        let epoch = CfDatetime::new(reference.year, reference.month, reference.day, calendar)
            .with_time(reference.hour, reference.minute, 0);
        offsets
            .iter()
            .enumerate()
            .map(|(index, &secs)| {
                epoch
                    .add_seconds(secs)
                    .map(Timestamp::Calendar)
                    .ok_or(ClimTrendError::InvalidTimeValue { index })
            })
            .collect()
    }
}

fn add_seconds(epoch: NaiveDateTime, seconds: i64) -> Option<NaiveDateTime> {
    TimeDelta::try_seconds(seconds).and_then(|delta| epoch.checked_add_signed(delta))
}
