//! climtrend: linear trends of gridded climate-model time series
//!
//! climtrend reads a NetCDF dataset and turns its time coordinate (including
//! model calendars such as `noleap` or `360_day`) into fractional years. It then
//! fits an ordinary least squares trend at every grid point and reports the
//! slope and its two-sided p-value as arrays shaped like the grid.
//!
//! ## Module Organization
//!
//! - [`calendar`]: calendar kinds and the tagged [`Timestamp`] type
//! - [`cf_time`]: decoding of CF `"<unit> since <date>"` time coordinates
//! - [`time_normalizer`]: timestamps to fractional years
//! - [`trend`]: per-gridpoint OLS slope and significance
//! - [`data_source`]: the [`DataSource`] trait and an in-memory dataset
//! - [`netcdf_io`]: [`DataSource`] for NetCDF files
//! - [`metadata`]: time range detection and variable selection
//! - [`regional`]: area-mean time series
//! - [`render`]: renderers and figure saving
//! - [`config`], [`pipeline`], [`parallel`]: orchestration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use climtrend::prelude::*;
//!
//! let file = climtrend::netcdf_io::load_netcdf("data/cesmlme_PRECTvolc.nc").unwrap();
//! let trend = compute_trend(&file, "PRECT", "time", &TrendOptions::default()).unwrap();
//! println!("slope grid: {:?}", trend.shape());
//! ```

pub mod calendar;
pub mod cf_time;
pub mod config;
pub mod data_source;
pub mod errors;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod pipeline;
pub mod regional;
pub mod render;
pub mod time_normalizer;
pub mod trend;

pub use calendar::{CalendarKind, CfDatetime, Timestamp};
pub use data_source::{DataSource, Dataset, ObservationField};
pub use errors::{ClimTrendError, RegressionIssue, Result};
pub use time_normalizer::{normalize, NumericTime};
pub use trend::{compute_trend, linear_regression, trend_over_axis, TrendResult};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::calendar::{CalendarKind, CfDatetime, Timestamp};
    pub use crate::config::AnalysisConfig;
    pub use crate::data_source::{DataSource, Dataset, ObservationField};
    pub use crate::errors::{ClimTrendError, Result};
    pub use crate::render::{Renderer, TextRenderer, TrendAnalysis};
    pub use crate::time_normalizer::{normalize, NumericTime};
    pub use crate::trend::{
        compute_trend, linear_regression, MissingValuePolicy, TrendOptions, TrendResult,
    };
}
