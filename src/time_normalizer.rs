//! Conversion of calendar timestamps into a fractional-year time axis
//!
//! The regression works on plain `f64` years. Dates on model calendars map to
//! `year + month / 12`; the day of month is ignored on that path, so the first and
//! the last day of a month share one value. Ordinary date-times keep their full
//! precision: `year + elapsed_days / days_in_year`. The two paths give different
//! values for the same calendar date.

use crate::calendar::{CalendarKind, Timestamp};
use crate::errors::{ClimTrendError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Ordered fractional-year values, one per input timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTime {
    values: Vec<f64>,
}

impl NumericTime {
    #[must_use]
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// First and last value
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.first()?, self.last()?))
    }

    /// Spacing of the first two steps in whole months, for diagnostics only
    #[must_use]
    pub fn step_months(&self) -> Option<i64> {
        match self.values.as_slice() {
            [first, second, ..] => Some(((second - first) * 12.0).round() as i64),
            _ => None,
        }
    }

    /// Whether every value is greater than or equal to the one before it
    #[must_use]
    pub fn is_non_decreasing(&self) -> bool {
        self.values.windows(2).all(|w| w[0] <= w[1])
    }
}

/// Normalize a time coordinate into fractional years.
///
/// `None` means the dataset has no time coordinate at all.
///
/// # Errors
///
/// Returns [`ClimTrendError::MissingTimeAxis`] for `None` and
/// [`ClimTrendError::EmptyTimeAxis`] for an empty slice.
pub fn normalize(timestamps: Option<&[Timestamp]>) -> Result<NumericTime> {
    let timestamps = timestamps.ok_or(ClimTrendError::MissingTimeAxis)?;
    if timestamps.is_empty() {
        return Err(ClimTrendError::EmptyTimeAxis);
    }

    let values = timestamps
        .iter()
        .map(|ts| match ts {
            Timestamp::Calendar(date) => f64::from(date.year) + f64::from(date.month) / 12.0,
            Timestamp::Standard(datetime) => fractional_year(datetime),
        })
        .collect();

    Ok(NumericTime { values })
}

fn fractional_year(datetime: &NaiveDateTime) -> f64 {
    let year_days = f64::from(CalendarKind::ProlepticGregorian.days_in_year(datetime.year()));
    let elapsed = f64::from(datetime.ordinal0())
        + f64::from(datetime.num_seconds_from_midnight()) / 86_400.0;
    f64::from(datetime.year()) + elapsed / year_days
}
