//! Defines command-line interface options using `clap` for the climtrend application.

use clap::Parser;
use climtrend::config::AnalysisConfig;
use climtrend::errors::Result;
use climtrend::trend::MissingValuePolicy;
use std::path::PathBuf;

/// A CLI tool for per-gridpoint linear trends of NetCDF climate data
#[derive(Parser, Debug)]
#[command(
    version,
    name = "climtrend",
    about = "Linear trend maps for gridded climate-model time series"
)]
pub struct Args {
    /// JSON configuration file; command-line options override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing <scenario>.nc files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Scenario (dataset) name; repeat for several
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,

    /// Directory where figures are written
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Variable to analyze. Defaults to the first data variable
    #[arg(long)]
    pub variable: Option<String>,

    /// Name of the time dimension
    #[arg(long)]
    pub time_dim: Option<String>,

    /// Leave grid points with missing values undefined instead of failing
    #[arg(long, default_value_t = false)]
    pub allow_missing: bool,

    /// Extension of saved figures
    #[arg(long)]
    pub format: Option<String>,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Build the analysis configuration: defaults, then the config file, then flags
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if !self.scenarios.is_empty() {
            config.scenarios = self.scenarios.clone();
        }
        if let Some(dir) = &self.save_dir {
            config.save_dir = dir.clone();
        }
        if let Some(var) = &self.variable {
            config.variable = Some(var.clone());
        }
        if let Some(dim) = &self.time_dim {
            config.time_axis = dim.clone();
        }
        if self.allow_missing {
            config.missing_values = MissingValuePolicy::MarkUndefined;
        }
        if let Some(format) = &self.format {
            config.figure_format = format.clone();
        }
        if self.threads.is_some() {
            config.threads = self.threads;
        }

        Ok(config)
    }
}
