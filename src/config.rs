//! Analysis configuration
//!
//! Replaces module-level settings with one value passed to the pipeline. It can
//! be read from a JSON file; every field has a default.

use crate::errors::Result;
use crate::trend::MissingValuePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Directory holding `{scenario}.nc` files
    pub data_dir: PathBuf,
    /// Dataset names, without the `.nc` extension
    pub scenarios: Vec<String>,
    /// Where figures are written
    pub save_dir: PathBuf,
    /// Variable to analyze; the first data variable when unset
    pub variable: Option<String>,
    pub time_axis: String,
    pub missing_values: MissingValuePolicy,
    /// Worker threads; rayon's default when unset
    pub threads: Option<usize>,
    pub figure_format: String,
    /// Significance level reported with each figure
    pub alpha: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            scenarios: vec!["cesmlme_PRECTvolc".to_string()],
            save_dir: PathBuf::from("output_figures"),
            variable: None,
            time_axis: "time".to_string(),
            missing_values: MissingValuePolicy::Fail,
            threads: None,
            figure_format: "txt".to_string(),
            alpha: 0.05,
        }
    }
}

impl AnalysisConfig {
    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClimTrendError::IoError`] if the file cannot be read and
    /// [`crate::ClimTrendError::ConfigError`] if it is not a valid configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// Returns [`crate::ClimTrendError::ConfigError`] for invalid JSON or unknown fields.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Path of the NetCDF file for a scenario
    #[must_use]
    pub fn scenario_path(&self, scenario: &str) -> PathBuf {
        self.data_dir.join(format!("{scenario}.nc"))
    }
}
