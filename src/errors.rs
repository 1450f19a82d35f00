//! Centralized error handling for climtrend
//!
//! Every failure of the time normalizer and the trend estimator is reported as a
//! variant of [`ClimTrendError`]. Nothing in the core logs or swallows an error.

use std::fmt;

/// Why a single 1-D regression could not produce a slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegressionIssue {
    /// All time values are identical
    ZeroTimeVariance,
    /// The series contains NaN or infinite values
    MissingValues,
    /// Time and value series differ in length
    LengthMismatch,
    /// Fewer than two points in the series
    TooFewPoints,
}

impl RegressionIssue {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ZeroTimeVariance => "time axis has zero variance",
            Self::MissingValues => "series contains missing values",
            Self::LengthMismatch => "time and value series differ in length",
            Self::TooFewPoints => "fewer than two points",
        }
    }
}

/// Main error type for climtrend operations
#[derive(Debug)]
pub enum ClimTrendError {
    /// No time coordinate is available at all
    MissingTimeAxis,

    /// A time coordinate exists but holds no values
    EmptyTimeAxis,

    /// Variable not found in the dataset
    VariableNotFound { var: String },

    /// Dataset has no dimension with the requested time axis name
    TimeAxisNotFound { axis: String },

    /// Time normalization failed; wraps the normalizer's error
    NormalizationFailed(Box<ClimTrendError>),

    /// Fewer than two normalized time points
    InsufficientSamples { count: usize },

    /// Per-coordinate regression could not be computed
    RegressionFailed {
        coordinate: Option<Vec<usize>>,
        issue: RegressionIssue,
    },

    /// Dimension not found in variable
    DimensionNotFound { var: String, dim: String },

    /// Time coordinate and variable disagree on the time axis length
    LengthMismatch { expected: usize, found: usize },

    /// CF time units string could not be parsed
    InvalidTimeUnits { units: String },

    /// Time coordinate value cannot be placed on the calendar
    InvalidTimeValue { index: usize },

    /// Calendar attribute names a calendar we cannot decode
    UnsupportedCalendar { calendar: String },

    /// Renderer could not build a figure from the trend
    RenderFailed { message: String },

    /// Analysis configuration could not be read
    ConfigError(serde_json::Error),

    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Thread pool configuration error
    ThreadPoolError(String),
}

impl fmt::Display for ClimTrendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClimTrendError::MissingTimeAxis => write!(f, "No time coordinate found in dataset"),
            ClimTrendError::EmptyTimeAxis => write!(f, "Time coordinate is empty"),
            ClimTrendError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in dataset", var)
            }
            ClimTrendError::TimeAxisNotFound { axis } => {
                write!(f, "No '{}' dimension found in dataset", axis)
            }
            ClimTrendError::NormalizationFailed(inner) => {
                write!(f, "Time conversion failed: {}", inner)
            }
            ClimTrendError::InsufficientSamples { count } => write!(
                f,
                "Not enough time points to compute trend: {} (need at least 2)",
                count
            ),
            ClimTrendError::RegressionFailed { coordinate, issue } => match coordinate {
                Some(coord) => write!(
                    f,
                    "Regression failed at coordinate {:?}: {}",
                    coord,
                    issue.as_str()
                ),
                None => write!(f, "Regression failed: {}", issue.as_str()),
            },
            ClimTrendError::DimensionNotFound { var, dim } => {
                write!(f, "Dimension '{}' not found in variable '{}'", dim, var)
            }
            ClimTrendError::LengthMismatch { expected, found } => write!(
                f,
                "Time axis length mismatch: variable has {} steps, time coordinate has {}",
                expected, found
            ),
            ClimTrendError::InvalidTimeUnits { units } => {
                write!(f, "Invalid CF time units: '{}'", units)
            }
            ClimTrendError::InvalidTimeValue { index } => {
                write!(f, "Time value at index {} cannot be decoded", index)
            }
            ClimTrendError::UnsupportedCalendar { calendar } => {
                write!(f, "Unsupported calendar: '{}'", calendar)
            }
            ClimTrendError::RenderFailed { message } => write!(f, "Rendering failed: {}", message),
            ClimTrendError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            ClimTrendError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            ClimTrendError::IoError(e) => write!(f, "I/O error: {}", e),
            ClimTrendError::ArrayError(e) => write!(f, "Array error: {}", e),
            ClimTrendError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
        }
    }
}

impl std::error::Error for ClimTrendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClimTrendError::NormalizationFailed(inner) => Some(inner.as_ref()),
            ClimTrendError::ConfigError(e) => Some(e),
            ClimTrendError::NetCDFError(e) => Some(e),
            ClimTrendError::IoError(e) => Some(e),
            ClimTrendError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for ClimTrendError {
    fn from(error: netcdf::Error) -> Self {
        ClimTrendError::NetCDFError(error)
    }
}

impl From<std::io::Error> for ClimTrendError {
    fn from(error: std::io::Error) -> Self {
        ClimTrendError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for ClimTrendError {
    fn from(error: ndarray::ShapeError) -> Self {
        ClimTrendError::ArrayError(error)
    }
}

impl From<serde_json::Error> for ClimTrendError {
    fn from(error: serde_json::Error) -> Self {
        ClimTrendError::ConfigError(error)
    }
}

/// Result type alias for climtrend operations
pub type Result<T> = std::result::Result<T, ClimTrendError>;
