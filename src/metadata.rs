//! Dataset inspection helpers used by the analysis pipeline
//!
//! Time range detection, unit lookup and the choice of a default variable.

use crate::calendar::Timestamp;
use crate::data_source::{DataSource, DEFAULT_UNITS};
use crate::errors::Result;

/// First and last date of a time coordinate plus its units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInfo {
    /// Earliest date, `YYYY-MM-DD`
    pub start: String,
    /// Latest date, `YYYY-MM-DD`
    pub end: String,
    pub units: String,
}

/// Detect the date range and units of a time coordinate.
///
/// Returns `Ok(None)` when the dataset has no such axis or the coordinate is
/// absent or empty.
///
/// # Errors
///
/// Returns an error when the coordinate exists but cannot be decoded.
pub fn detect_time_format<S: DataSource + ?Sized>(
    source: &S,
    time_axis: &str,
) -> Result<Option<TimeInfo>> {
    if !source.has_time_axis(time_axis) {
        return Ok(None);
    }
    let Some(timestamps) = source.timestamps(time_axis)? else {
        return Ok(None);
    };
    Ok(TimeInfo::from_timestamps(
        &timestamps,
        source.time_units(time_axis),
    ))
}

impl TimeInfo {
    /// Range of already decoded timestamps; `None` when the slice is empty
    pub fn from_timestamps(timestamps: &[Timestamp], units: Option<String>) -> Option<Self> {
        let start = timestamps.iter().min_by_key(|ts| ts.sort_key())?;
        let end = timestamps.iter().max_by_key(|ts| ts.sort_key())?;
        Some(Self {
            start: start.date_string(),
            end: end.date_string(),
            units: units.unwrap_or_else(|| DEFAULT_UNITS.to_string()),
        })
    }
}

/// Units label of a variable, `"Unknown"` when it has none
pub fn variable_units<S: DataSource + ?Sized>(source: &S, var_name: &str) -> String {
    source
        .variable_units(var_name)
        .unwrap_or_else(|| DEFAULT_UNITS.to_string())
}

/// The first data variable of a dataset, if any
pub fn first_data_variable<S: DataSource + ?Sized>(source: &S) -> Option<String> {
    source.data_variables().into_iter().next()
}

/// Whether every timestamp in the slice uses a model calendar
#[must_use]
pub fn uses_model_calendar(timestamps: &[Timestamp]) -> bool {
    !timestamps.is_empty()
        && timestamps
            .iter()
            .all(|ts| matches!(ts, Timestamp::Calendar(_)))
}
