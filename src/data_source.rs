//! Data source abstraction shared by NetCDF files and in-memory datasets
//!
//! The trend estimator only needs to ask a dataset a handful of questions: does
//! a variable or a time axis exist, what are the decoded timestamps, and what are
//! the values of a variable. [`DataSource`] captures exactly that.

use crate::calendar::{CalendarKind, Timestamp};
use crate::cf_time;
use crate::errors::{ClimTrendError, Result};
use ndarray::{ArrayD, ErrorKind, ShapeError};
use std::collections::HashMap;

/// Unit label used when a variable carries no `units` attribute
pub const DEFAULT_UNITS: &str = "Unknown";

/// A variable's values together with its dimension labels and units
#[derive(Debug, Clone)]
pub struct ObservationField {
    pub name: String,
    pub dimensions: Vec<String>,
    pub data: ArrayD<f64>,
    pub units: String,
}

impl ObservationField {
    /// Create a field with the default unit label.
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::ArrayError`] if the number of dimension labels
    /// differs from the array's number of axes.
    pub fn new(name: &str, dimensions: &[&str], data: ArrayD<f64>) -> Result<Self> {
        if dimensions.len() != data.ndim() {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        Ok(Self {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| (*d).to_string()).collect(),
            data,
            units: DEFAULT_UNITS.to_string(),
        })
    }

    #[must_use]
    pub fn with_units(mut self, units: &str) -> Self {
        self.units = units.to_string();
        self
    }

    /// Axis index of a dimension label
    #[must_use]
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dim)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Read-only access to a gridded dataset
pub trait DataSource {
    /// Whether a variable with this name exists
    fn has_variable(&self, name: &str) -> bool;

    /// Whether the dataset defines a dimension with this name
    fn has_time_axis(&self, axis: &str) -> bool;

    /// Decoded values of the time coordinate, `None` when there is no coordinate
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinate exists but cannot be read or decoded.
    fn timestamps(&self, axis: &str) -> Result<Option<Vec<Timestamp>>>;

    /// The `units` attribute of the time coordinate
    fn time_units(&self, axis: &str) -> Option<String>;

    /// Load all values of a variable
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::VariableNotFound`] for unknown names.
    fn read_field(&self, name: &str) -> Result<ObservationField>;

    /// The `units` attribute of a variable
    fn variable_units(&self, name: &str) -> Option<String>;

    /// Names of non-coordinate variables, in dataset order
    fn data_variables(&self) -> Vec<String>;

    /// Values of a 1-D coordinate variable such as `lat` or `lon`
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinate exists but cannot be read.
    fn coordinate_values(&self, name: &str) -> Result<Option<Vec<f64>>>;
}

#[derive(Debug, Clone)]
struct TimeAxis {
    timestamps: Vec<Timestamp>,
    units: Option<String>,
}

/// In-memory dataset, built programmatically
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    dimensions: Vec<(String, usize)>,
    variables: Vec<ObservationField>,
    coordinates: HashMap<String, Vec<f64>>,
    time_axes: HashMap<String, TimeAxis>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        self.register_dimension(name, len);
        self
    }

    /// Add a data variable, registering its dimensions
    #[must_use]
    pub fn with_variable(mut self, field: ObservationField) -> Self {
        for (dim, &len) in field.dimensions.iter().zip(field.data.shape()) {
            self.register_dimension(dim, len);
        }
        self.variables.retain(|v| v.name != field.name);
        self.variables.push(field);
        self
    }

    #[must_use]
    pub fn with_coordinate(mut self, name: &str, values: Vec<f64>) -> Self {
        self.register_dimension(name, values.len());
        self.coordinates.insert(name.to_string(), values);
        self
    }

    /// Attach already decoded timestamps as the time coordinate `name`
    #[must_use]
    pub fn with_time_axis(mut self, name: &str, timestamps: Vec<Timestamp>) -> Self {
        self.register_dimension(name, timestamps.len());
        self.time_axes.insert(
            name.to_string(),
            TimeAxis {
                timestamps,
                units: None,
            },
        );
        self
    }

    /// Attach a CF-encoded time coordinate, decoding it on the way in
    ///
    /// # Errors
    ///
    /// Propagates [`cf_time::decode`] errors.
    pub fn with_encoded_time_axis(
        mut self,
        name: &str,
        values: &[f64],
        units: &str,
        calendar: CalendarKind,
    ) -> Result<Self> {
        let timestamps = cf_time::decode(values, units, calendar)?;
        self.register_dimension(name, timestamps.len());
        self.time_axes.insert(
            name.to_string(),
            TimeAxis {
                timestamps,
                units: Some(units.to_string()),
            },
        );
        Ok(self)
    }

    #[must_use]
    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|(dim, _)| dim == name)
            .map(|(_, len)| *len)
    }

    fn register_dimension(&mut self, name: &str, len: usize) {
        if self.dimension_len(name).is_none() {
            self.dimensions.push((name.to_string(), len));
        }
    }
}

impl DataSource for Dataset {
    fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    fn has_time_axis(&self, axis: &str) -> bool {
        self.dimension_len(axis).is_some()
    }

    fn timestamps(&self, axis: &str) -> Result<Option<Vec<Timestamp>>> {
        Ok(self.time_axes.get(axis).map(|t| t.timestamps.clone()))
    }

    fn time_units(&self, axis: &str) -> Option<String> {
        self.time_axes.get(axis).and_then(|t| t.units.clone())
    }

    fn read_field(&self, name: &str) -> Result<ObservationField> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| ClimTrendError::VariableNotFound {
                var: name.to_string(),
            })
    }

    fn variable_units(&self, name: &str) -> Option<String> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .filter(|v| v.units != DEFAULT_UNITS)
            .map(|v| v.units.clone())
    }

    fn data_variables(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    fn coordinate_values(&self, name: &str) -> Result<Option<Vec<f64>>> {
        Ok(self.coordinates.get(name).cloned())
    }
}
