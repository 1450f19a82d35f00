//! Area-mean time series
//!
//! Averages a field over a set of named dimensions (by default `lat` and `lon`),
//! skipping NaN and infinite values.

use crate::data_source::ObservationField;
use crate::errors::{ClimTrendError, Result};
use ndarray::parallel::prelude::*;
use ndarray::{ArrayD, Axis, IxDyn};

/// Dimensions averaged by [`regional_mean_default`]
pub const DEFAULT_REGION_DIMS: [&str; 2] = ["lat", "lon"];

/// Mean of `field` over `dims`, computed in parallel over the kept coordinates.
///
/// A kept coordinate with no finite value gets NaN.
///
/// # Errors
///
/// Returns [`ClimTrendError::DimensionNotFound`] if a name in `dims` is not a
/// dimension of `field`.
pub fn regional_mean(field: &ObservationField, dims: &[&str]) -> Result<ObservationField> {
    let mut reduced = Vec::with_capacity(dims.len());
    for dim in dims {
        let axis = field
            .axis_of(dim)
            .ok_or_else(|| ClimTrendError::DimensionNotFound {
                var: field.name.clone(),
                dim: (*dim).to_string(),
            })?;
        if !reduced.contains(&axis) {
            reduced.push(axis);
        }
    }

    let shape = field.shape();
    let kept: Vec<usize> = (0..shape.len()).filter(|a| !reduced.contains(a)).collect();
    let kept_shape: Vec<usize> = kept.iter().map(|&a| shape[a]).collect();
    let kept_size: usize = kept_shape.iter().product();
    let reduced_size: usize = reduced.iter().map(|&a| shape[a]).product();

    let order: Vec<usize> = kept.iter().chain(&reduced).copied().collect();
    let cells = field
        .data
        .view()
        .permuted_axes(IxDyn(&order))
        .as_standard_layout()
        .into_owned()
        .into_shape((kept_size, reduced_size))?;

    let means: Vec<f64> = cells
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| {
            let (sum, count) = row
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0_f64, 0_usize), |(sum, count), &v| (sum + v, count + 1));
            if count > 0 {
                sum / count as f64
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(ObservationField {
        name: format!("{}_regional_mean", field.name),
        dimensions: kept.iter().map(|&a| field.dimensions[a].clone()).collect(),
        data: ArrayD::from_shape_vec(kept_shape, means)?,
        units: field.units.clone(),
    })
}

/// Mean over `lat` and `lon`
///
/// # Errors
///
/// See [`regional_mean`].
pub fn regional_mean_default(field: &ObservationField) -> Result<ObservationField> {
    regional_mean(field, &DEFAULT_REGION_DIMS)
}
