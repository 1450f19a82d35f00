//! Per-scenario analysis loop
//!
//! For each configured scenario: open `{data_dir}/{scenario}.nc`, pick the
//! variable, normalize time, compute the trend, render it and save the figure.
//! A failing scenario is reported and the loop moves on to the next one.

use crate::config::AnalysisConfig;
use crate::data_source::DataSource;
use crate::errors::{ClimTrendError, Result};
use crate::metadata::{first_data_variable, uses_model_calendar, variable_units, TimeInfo};
use crate::netcdf_io::load_netcdf;
use crate::parallel::get_parallel_info;
use crate::render::{save_figure, FigureStats, Renderer, TextRenderer, TrendAnalysis};
use crate::trend::{checked_time_axis, trend_on_time, TrendOptions};
use log::{debug, error, info, warn};
use std::path::PathBuf;

/// Outcome of one successfully analyzed scenario
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub scenario: String,
    pub variable: String,
    pub units: String,
    pub start_year: f64,
    pub end_year: f64,
    pub figure_path: PathBuf,
    pub stats: FigureStats,
    pub undefined_points: usize,
}

/// Compute the trend analysis of one dataset.
///
/// # Errors
///
/// Returns [`ClimTrendError::VariableNotFound`] when no variable is configured
/// and the dataset has no data variables. Otherwise the errors of
/// [`crate::trend::compute_trend`], checked in the same order.
pub fn analyze_source<S: DataSource + ?Sized>(
    source: &S,
    dataset_name: &str,
    config: &AnalysisConfig,
) -> Result<TrendAnalysis> {
    let variable = match &config.variable {
        Some(name) => name.clone(),
        None => first_data_variable(source).ok_or_else(|| ClimTrendError::VariableNotFound {
            var: "<first data variable>".to_string(),
        })?,
    };
    info!("Using variable: {}", variable);

    let units = variable_units(source, &variable);
    info!("Variable units: {}", units);

    let checked = checked_time_axis(source, &variable, &config.time_axis)?;
    if uses_model_calendar(&checked.timestamps) {
        debug!("Converting model-calendar timestamps to fractional years");
    }
    let (start_year, end_year) = checked.time.range().ok_or(ClimTrendError::EmptyTimeAxis)?;
    match checked.time.step_months() {
        Some(step) => info!(
            "Time range: {:.2} - {:.2} ({} months per step)",
            start_year, end_year, step
        ),
        None => info!("Time range: {:.2} - {:.2}", start_year, end_year),
    }

    let options = TrendOptions {
        missing: config.missing_values,
        parallel: true,
    };
    info!("Computing trend for {}", variable);
    let result = trend_on_time(
        source,
        &variable,
        &config.time_axis,
        &checked.time,
        &options,
    )?;
    let points = result.slope.len();
    debug!(
        "Fitted {} grid points, about {} per worker",
        points,
        get_parallel_info().points_per_thread(points)
    );
    if !result.undefined.is_empty() {
        warn!(
            "{} grid points left undefined because of missing values",
            result.undefined.len()
        );
    }

    let time_info = TimeInfo::from_timestamps(
        &checked.timestamps,
        source.time_units(&config.time_axis),
    );
    if let Some(info) = &time_info {
        info!(
            "Time detected: {} to {} ({})",
            info.start, info.end, info.units
        );
    }

    Ok(TrendAnalysis {
        variable,
        dataset: dataset_name.to_string(),
        units,
        start_year,
        end_year,
        result,
        time_info,
        latitudes: source.coordinate_values("lat")?,
        longitudes: source.coordinate_values("lon")?,
    })
}

/// Analyze, render and save one scenario.
///
/// # Errors
///
/// Any loading, trend, rendering or I/O error for this scenario.
pub fn run_scenario(
    config: &AnalysisConfig,
    scenario: &str,
    renderer: &dyn Renderer,
) -> Result<ScenarioReport> {
    let path = config.scenario_path(scenario);
    info!("Checking file: {}", path.display());

    let file = load_netcdf(&path)?;
    info!("Dataset loaded: {}", scenario);
    debug!("Available variables: {:?}", file.data_variables());

    let analysis = analyze_source(&file, scenario, config)?;

    info!("Plotting trend for {}", analysis.variable);
    let figure = renderer.render(&analysis)?;
    let figure_path = save_figure(
        &figure,
        &analysis.variable,
        scenario,
        "trend",
        &config.figure_format,
        &config.save_dir,
    )?;
    info!("Figure saved: {}", figure_path.display());

    Ok(ScenarioReport {
        scenario: scenario.to_string(),
        variable: analysis.variable,
        units: analysis.units,
        start_year: analysis.start_year,
        end_year: analysis.end_year,
        figure_path,
        stats: figure.stats,
        undefined_points: analysis.result.undefined.len(),
    })
}

/// Run every configured scenario with the default text renderer
pub fn run_analysis(config: &AnalysisConfig) -> Vec<(String, Result<ScenarioReport>)> {
    let renderer = TextRenderer {
        alpha: config.alpha,
        ..TextRenderer::default()
    };

    config
        .scenarios
        .iter()
        .map(|scenario| {
            let outcome = run_scenario(config, scenario, &renderer);
            if let Err(e) = &outcome {
                error!("Scenario {} failed: {}", scenario, e);
            }
            (scenario.clone(), outcome)
        })
        .collect()
}
