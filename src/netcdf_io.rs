//! NetCDF input
//!
//! Implements [`DataSource`] for an open `netcdf::File`. Variable values are read
//! as `f64`, `_FillValue` and `missing_value` entries become NaN, and
//! `scale_factor`/`add_offset` packing is undone.

use crate::calendar::{CalendarKind, Timestamp};
use crate::cf_time;
use crate::data_source::{DataSource, ObservationField, DEFAULT_UNITS};
use crate::errors::{ClimTrendError, Result};
use ndarray::ArrayD;
use netcdf::{AttributeValue, File, Variable};
use std::path::Path;

/// Open a NetCDF file for reading.
///
/// # Errors
///
/// Returns [`ClimTrendError::NetCDFError`] if the file cannot be opened.
pub fn load_netcdf<P: AsRef<Path>>(path: P) -> Result<File> {
    Ok(netcdf::open(path.as_ref())?)
}

/// String value of a variable attribute
pub fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Scalar numeric value of a variable attribute
pub fn numeric_attribute(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        _ => None,
    }
}

fn is_coordinate(var: &Variable) -> bool {
    let dims = var.dimensions();
    dims.len() == 1 && dims[0].name() == var.name()
}

impl DataSource for File {
    fn has_variable(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    fn has_time_axis(&self, axis: &str) -> bool {
        self.dimension(axis).is_some()
    }

    fn timestamps(&self, axis: &str) -> Result<Option<Vec<Timestamp>>> {
        let Some(var) = self.variable(axis) else {
            return Ok(None);
        };

        let units = string_attribute(&var, "units").ok_or_else(|| {
            ClimTrendError::InvalidTimeUnits {
                units: String::new(),
            }
        })?;
        let calendar = CalendarKind::from_attribute(string_attribute(&var, "calendar").as_deref())?;
        let raw: Vec<f64> = var.get_values::<f64, _>(..)?;

        cf_time::decode(&raw, &units, calendar).map(Some)
    }

    fn time_units(&self, axis: &str) -> Option<String> {
        self.variable(axis)
            .and_then(|var| string_attribute(&var, "units"))
    }

    fn read_field(&self, name: &str) -> Result<ObservationField> {
        let var = self
            .variable(name)
            .ok_or_else(|| ClimTrendError::VariableNotFound {
                var: name.to_string(),
            })?;

        let dimensions: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        let shape: Vec<usize> = var
            .dimensions()
            .iter()
            .map(netcdf::Dimension::len)
            .collect();

        let fill_values: Vec<f64> = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|attr| numeric_attribute(&var, attr))
            .collect();
        let scale = numeric_attribute(&var, "scale_factor").unwrap_or(1.0);
        let offset = numeric_attribute(&var, "add_offset").unwrap_or(0.0);

        let values: Vec<f64> = var
            .get_values::<f64, _>(..)?
            .into_iter()
            .map(|v| {
                if fill_values.iter().any(|&fv| fv == v) {
                    f64::NAN
                } else {
                    v * scale + offset
                }
            })
            .collect();

        Ok(ObservationField {
            name: name.to_string(),
            dimensions,
            data: ArrayD::from_shape_vec(shape, values)?,
            units: string_attribute(&var, "units").unwrap_or_else(|| DEFAULT_UNITS.to_string()),
        })
    }

    fn variable_units(&self, name: &str) -> Option<String> {
        self.variable(name)
            .and_then(|var| string_attribute(&var, "units"))
    }

    fn data_variables(&self) -> Vec<String> {
        let bounds: Vec<String> = self
            .variables()
            .filter(|var| is_coordinate(var))
            .filter_map(|var| string_attribute(&var, "bounds"))
            .collect();

        self.variables()
            .filter(|var| !is_coordinate(var))
            .map(|var| var.name().to_string())
            .filter(|name| !bounds.contains(name))
            .collect()
    }

    fn coordinate_values(&self, name: &str) -> Result<Option<Vec<f64>>> {
        match self.variable(name) {
            Some(var) => Ok(Some(var.get_values::<f64, _>(..)?)),
            None => Ok(None),
        }
    }
}
