//! Per-gridpoint linear trend estimation
//!
//! For every coordinate of the non-time axes, the series along time is regressed
//! against the fractional-year axis with ordinary least squares. The slope and the
//! two-sided p-value of the slope land in two arrays shaped like the input minus
//! the time axis. Coordinates are independent, so the loop runs on the rayon pool
//! unless [`TrendOptions::parallel`] is off; both paths give identical output.

use crate::calendar::Timestamp;
use crate::data_source::{DataSource, ObservationField};
use crate::errors::{ClimTrendError, RegressionIssue, Result};
use crate::time_normalizer::{normalize, NumericTime};
use ndarray::parallel::prelude::*;
use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Guards the t statistic of a perfect fit against division by zero
const TINY: f64 = 1.0e-20;

/// Ordinary least squares fit of one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    /// Two-sided p-value for the null hypothesis `slope == 0`
    pub p_value: f64,
    /// Standard error of the slope
    pub std_err: f64,
}

/// What to do with coordinates whose regression fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Abort the whole computation at the first failing coordinate
    #[default]
    Fail,
    /// Store NaN slope and p-value and record the coordinate in [`TrendResult::undefined`]
    MarkUndefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendOptions {
    pub missing: MissingValuePolicy,
    pub parallel: bool,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            missing: MissingValuePolicy::Fail,
            parallel: true,
        }
    }
}

/// Slope and significance maps for one variable
#[derive(Debug, Clone)]
pub struct TrendResult {
    /// Trend in variable units per year
    pub slope: ArrayD<f64>,
    pub p_value: ArrayD<f64>,
    /// Labels of the remaining (non-time) axes
    pub dimensions: Vec<String>,
    /// Coordinates left undefined under [`MissingValuePolicy::MarkUndefined`]
    pub undefined: Vec<Vec<usize>>,
}

impl TrendResult {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.slope.shape()
    }

    #[must_use]
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dim)
    }

    /// Share of defined coordinates with `p_value < alpha`
    #[must_use]
    pub fn significant_fraction(&self, alpha: f64) -> Option<f64> {
        significant_fraction(self.p_value.iter(), alpha)
    }
}

/// Share of finite p-values below `alpha`; `None` when none are finite
pub fn significant_fraction<'a>(
    p_values: impl IntoIterator<Item = &'a f64>,
    alpha: f64,
) -> Option<f64> {
    let (defined, significant) = p_values
        .into_iter()
        .filter(|p| p.is_finite())
        .fold((0usize, 0usize), |(defined, hits), &p| {
            (defined + 1, hits + usize::from(p < alpha))
        });
    (defined > 0).then(|| significant as f64 / defined as f64)
}

/// Fit `values = slope * time + intercept` by ordinary least squares.
///
/// The p-value uses the Student t distribution with `n - 2` degrees of freedom.
/// With exactly two points the fit is exact; the p-value is 0 when the values
/// differ and 1 when they are equal.
///
/// # Errors
///
/// Returns [`ClimTrendError::RegressionFailed`] when the series lengths differ,
/// fewer than two points are given, any value is NaN or infinite, or all time
/// values are identical.
pub fn linear_regression(time: &[f64], values: &[f64]) -> Result<Regression> {
    let fail = |issue| ClimTrendError::RegressionFailed {
        coordinate: None,
        issue,
    };

    if time.len() != values.len() {
        return Err(fail(RegressionIssue::LengthMismatch));
    }
    let n = time.len();
    if n < 2 {
        return Err(fail(RegressionIssue::TooFewPoints));
    }
    if time.iter().chain(values).any(|v| !v.is_finite()) {
        return Err(fail(RegressionIssue::MissingValues));
    }
    if time.iter().all(|&t| t == time[0]) {
        return Err(fail(RegressionIssue::ZeroTimeVariance));
    }

    let n_f = n as f64;
    let mean_t = time.iter().sum::<f64>() / n_f;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let (mut ss_t, mut ss_y, mut sp) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&t, &y) in time.iter().zip(values) {
        let dt = t - mean_t;
        let dy = y - mean_y;
        ss_t += dt * dt;
        ss_y += dy * dy;
        sp += dt * dy;
    }
    if ss_t <= 0.0 {
        return Err(fail(RegressionIssue::ZeroTimeVariance));
    }

    let slope = sp / ss_t;
    let intercept = mean_y - slope * mean_t;
    let r_value = if ss_y == 0.0 {
        0.0
    } else {
        (sp / (ss_t * ss_y).sqrt()).clamp(-1.0, 1.0)
    };

    if n == 2 {
        let p_value = if values[0] == values[1] { 1.0 } else { 0.0 };
        return Ok(Regression {
            slope,
            intercept,
            r_value,
            p_value,
            std_err: 0.0,
        });
    }

    let df = n_f - 2.0;
    let t_stat = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| fail(RegressionIssue::TooFewPoints))?;
    let p_value = (2.0 * dist.cdf(-t_stat.abs())).min(1.0);
    let std_err = ((1.0 - r_value * r_value) * ss_y / ss_t / df).sqrt();

    Ok(Regression {
        slope,
        intercept,
        r_value,
        p_value,
        std_err,
    })
}

/// Row-major multi-index of a flat position within `shape`
#[must_use]
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (slot, &len) in index.iter_mut().zip(shape).rev() {
        if len > 0 {
            *slot = flat % len;
            flat /= len;
        }
    }
    index
}

/// Decoded time coordinate together with its fractional-year values
#[derive(Debug, Clone)]
pub struct CheckedTime {
    pub timestamps: Vec<Timestamp>,
    pub time: NumericTime,
}

/// Validate a trend request and normalize its time coordinate.
///
/// Checks run in this order: the variable exists, the time axis exists, the
/// time coordinate normalizes, and it has at least two points.
///
/// # Errors
///
/// [`ClimTrendError::VariableNotFound`], [`ClimTrendError::TimeAxisNotFound`],
/// [`ClimTrendError::NormalizationFailed`] and
/// [`ClimTrendError::InsufficientSamples`] for the checks above.
pub fn checked_time_axis<S: DataSource + ?Sized>(
    source: &S,
    var_name: &str,
    time_axis: &str,
) -> Result<CheckedTime> {
    if !source.has_variable(var_name) {
        return Err(ClimTrendError::VariableNotFound {
            var: var_name.to_string(),
        });
    }
    if !source.has_time_axis(time_axis) {
        return Err(ClimTrendError::TimeAxisNotFound {
            axis: time_axis.to_string(),
        });
    }

    let timestamps = source
        .timestamps(time_axis)
        .map_err(|e| ClimTrendError::NormalizationFailed(Box::new(e)))?;
    let time = normalize(timestamps.as_deref())
        .map_err(|e| ClimTrendError::NormalizationFailed(Box::new(e)))?;

    if time.len() < 2 {
        return Err(ClimTrendError::InsufficientSamples { count: time.len() });
    }

    Ok(CheckedTime {
        timestamps: timestamps.unwrap_or_default(),
        time,
    })
}

/// Compute the trend of a variable against an already normalized time axis.
///
/// # Errors
///
/// [`ClimTrendError::VariableNotFound`] if the variable cannot be read,
/// [`ClimTrendError::DimensionNotFound`] if it does not vary along `time_axis`,
/// and anything [`trend_over_axis`] returns.
pub fn trend_on_time<S: DataSource + ?Sized>(
    source: &S,
    var_name: &str,
    time_axis: &str,
    time: &NumericTime,
    options: &TrendOptions,
) -> Result<TrendResult> {
    let field = source.read_field(var_name)?;
    let axis = field
        .axis_of(time_axis)
        .ok_or_else(|| ClimTrendError::DimensionNotFound {
            var: var_name.to_string(),
            dim: time_axis.to_string(),
        })?;

    trend_over_axis(&field, time, axis, options)
}

/// Compute the trend of a variable in a dataset.
///
/// # Errors
///
/// Everything [`checked_time_axis`] and [`trend_on_time`] return, in that order.
pub fn compute_trend<S: DataSource + ?Sized>(
    source: &S,
    var_name: &str,
    time_axis: &str,
    options: &TrendOptions,
) -> Result<TrendResult> {
    let checked = checked_time_axis(source, var_name, time_axis)?;
    trend_on_time(source, var_name, time_axis, &checked.time, options)
}

/// Regress every series of `field` along `axis` against `time`.
///
/// # Errors
///
/// - [`ClimTrendError::DimensionNotFound`] if `axis` is out of range
/// - [`ClimTrendError::LengthMismatch`] if `time` and the axis differ in length
/// - [`ClimTrendError::InsufficientSamples`] for fewer than two time points
/// - [`ClimTrendError::RegressionFailed`] for a zero-variance time axis, or for a
///   failing coordinate under [`MissingValuePolicy::Fail`]
pub fn trend_over_axis(
    field: &ObservationField,
    time: &NumericTime,
    axis: usize,
    options: &TrendOptions,
) -> Result<TrendResult> {
    let shape = field.shape().to_vec();
    if axis >= shape.len() {
        return Err(ClimTrendError::DimensionNotFound {
            var: field.name.clone(),
            dim: format!("axis {axis}"),
        });
    }

    let steps = shape[axis];
    if steps != time.len() {
        return Err(ClimTrendError::LengthMismatch {
            expected: steps,
            found: time.len(),
        });
    }
    if steps < 2 {
        return Err(ClimTrendError::InsufficientSamples { count: steps });
    }

    let t = time.as_slice();
    if t.iter().all(|&v| v == t[0]) {
        return Err(ClimTrendError::RegressionFailed {
            coordinate: None,
            issue: RegressionIssue::ZeroTimeVariance,
        });
    }

    let mut order: Vec<usize> = (0..shape.len()).filter(|&a| a != axis).collect();
    order.push(axis);
    let point_shape: Vec<usize> = order[..order.len() - 1].iter().map(|&a| shape[a]).collect();
    let points: usize = point_shape.iter().product();

    // One contiguous row per coordinate, time running along the row
    let series = field
        .data
        .view()
        .permuted_axes(IxDyn(&order))
        .as_standard_layout()
        .into_owned()
        .into_shape((points, steps))?;

    let fit = |row: ArrayView1<f64>| match row.as_slice() {
        Some(values) => linear_regression(t, values),
        None => linear_regression(t, &row.to_vec()),
    };

    let fits: Vec<Result<Regression>> = if options.parallel {
        series.axis_iter(Axis(0)).into_par_iter().map(fit).collect()
    } else {
        series.axis_iter(Axis(0)).map(fit).collect()
    };

    let mut slopes = Vec::with_capacity(points);
    let mut p_values = Vec::with_capacity(points);
    let mut undefined = Vec::new();

    for (i, fit) in fits.into_iter().enumerate() {
        match fit {
            Ok(reg) => {
                slopes.push(reg.slope);
                p_values.push(reg.p_value);
            }
            Err(ClimTrendError::RegressionFailed { issue, .. }) => {
                let coordinate = unravel_index(i, &point_shape);
                match options.missing {
                    MissingValuePolicy::Fail => {
                        return Err(ClimTrendError::RegressionFailed {
                            coordinate: Some(coordinate),
                            issue,
                        });
                    }
                    MissingValuePolicy::MarkUndefined => {
                        slopes.push(f64::NAN);
                        p_values.push(f64::NAN);
                        undefined.push(coordinate);
                    }
                }
            }
            Err(other) => return Err(other),
        }
    }

    let dimensions = order[..order.len() - 1]
        .iter()
        .map(|&a| field.dimensions[a].clone())
        .collect();

    Ok(TrendResult {
        slope: ArrayD::from_shape_vec(point_shape.clone(), slopes)?,
        p_value: ArrayD::from_shape_vec(point_shape, p_values)?,
        dimensions,
        undefined,
    })
}
