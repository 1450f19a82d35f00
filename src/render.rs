//! Presentation of trend maps
//!
//! A [`Renderer`] turns a [`TrendAnalysis`] into a [`Figure`]. The bundled
//! [`TextRenderer`] produces a titled, captioned plain-text map. Missing values
//! are shown as zero here and only here; the trend arrays themselves are never
//! modified.

use crate::errors::{ClimTrendError, Result};
use crate::metadata::TimeInfo;
use crate::trend::{significant_fraction, TrendResult};
use ndarray::{Array2, ArrayViewD, Axis, Ix2};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a renderer needs to draw one trend map
#[derive(Debug, Clone)]
pub struct TrendAnalysis {
    pub variable: String,
    pub dataset: String,
    pub units: String,
    /// First normalized time value
    pub start_year: f64,
    /// Last normalized time value
    pub end_year: f64,
    pub result: TrendResult,
    pub time_info: Option<TimeInfo>,
    pub latitudes: Option<Vec<f64>>,
    pub longitudes: Option<Vec<f64>>,
}

/// Summary numbers shown alongside a map
#[derive(Debug, Clone, PartialEq)]
pub struct FigureStats {
    pub rows: usize,
    pub columns: usize,
    pub min_slope: f64,
    pub max_slope: f64,
    pub mean_slope: f64,
    /// Missing grid cells drawn as zero
    pub missing_replaced: usize,
    /// Share of defined cells with p below the renderer's alpha
    pub significant_fraction: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub colorbar_label: String,
    pub caption: String,
    pub stats: FigureStats,
    /// Full rendered text
    pub body: String,
}

pub trait Renderer {
    /// Build a figure for one analysis
    ///
    /// # Errors
    ///
    /// Returns [`ClimTrendError::RenderFailed`] when the trend cannot be laid out
    /// as a map.
    fn render(&self, analysis: &TrendAnalysis) -> Result<Figure>;
}

/// Plain-text latitude/longitude map renderer
#[derive(Debug, Clone)]
pub struct TextRenderer {
    pub lat_dim: String,
    pub lon_dim: String,
    /// Only the first member along this dimension is drawn
    pub ensemble_dim: String,
    pub alpha: f64,
    /// Write every grid cell into the figure body
    pub include_grid: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            lat_dim: "lat".to_string(),
            lon_dim: "lon".to_string(),
            ensemble_dim: "ensemble".to_string(),
            alpha: 0.05,
            include_grid: true,
        }
    }
}

impl TextRenderer {
    /// Reduce a result array to a (lat, lon) grid
    fn select_grid(&self, dims: &[String], data: ArrayViewD<'_, f64>) -> Result<Array2<f64>> {
        let mut dims = dims.to_vec();
        let mut view = data;

        if let Some(axis) = dims.iter().position(|d| *d == self.ensemble_dim) {
            if view.shape()[axis] == 0 {
                return Err(ClimTrendError::RenderFailed {
                    message: format!("'{}' dimension is empty", self.ensemble_dim),
                });
            }
            view = view.index_axis_move(Axis(axis), 0);
            dims.remove(axis);
        }

        let lat = dims.iter().position(|d| *d == self.lat_dim);
        let lon = dims.iter().position(|d| *d == self.lon_dim);
        let (Some(lat), Some(lon)) = (lat, lon) else {
            return Err(ClimTrendError::RenderFailed {
                message: format!(
                    "trend has no '{}' and '{}' dimensions: [{}]",
                    self.lat_dim,
                    self.lon_dim,
                    dims.join(", ")
                ),
            });
        };
        if dims.len() != 2 {
            return Err(ClimTrendError::RenderFailed {
                message: format!("expected a 2-D grid, got dimensions [{}]", dims.join(", ")),
            });
        }

        let grid = view.into_dimensionality::<Ix2>()?;
        let grid = if lat < lon { grid } else { grid.reversed_axes() };
        Ok(grid.to_owned())
    }
}

impl Renderer for TextRenderer {
    fn render(&self, analysis: &TrendAnalysis) -> Result<Figure> {
        let result = &analysis.result;
        let slope = self.select_grid(&result.dimensions, result.slope.view())?;
        let p_value = self.select_grid(&result.dimensions, result.p_value.view())?;

        let missing_replaced = slope.iter().filter(|v| !v.is_finite()).count();
        let display = slope.mapv(|v| if v.is_finite() { v } else { 0.0 });
        let (rows, columns) = display.dim();

        let cells = display.len().max(1) as f64;
        let min_slope = display.iter().copied().fold(f64::INFINITY, f64::min);
        let max_slope = display.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_slope = display.sum() / cells;

        let significant_fraction = significant_fraction(p_value.iter(), self.alpha);

        let period = format!("{:.0}-{:.0}", analysis.start_year, analysis.end_year);
        let title = format!("{} Trend ({})", analysis.variable, period);
        let colorbar_label = format!("{} Trend ({})", analysis.variable, analysis.units);
        let mut caption = format!(
            "{} Linear Trend ({}).\nUnits: {}.",
            analysis.variable, period, analysis.units
        );
        if let Some(info) = &analysis.time_info {
            let _ = write!(
                caption,
                "\nTime axis: {} to {} ({}).",
                info.start, info.end, info.units
            );
        }

        let stats = FigureStats {
            rows,
            columns,
            min_slope,
            max_slope,
            mean_slope,
            missing_replaced,
            significant_fraction,
        };

        let mut body = String::new();
        let _ = writeln!(body, "{title}");
        let _ = writeln!(body, "{}", "=".repeat(title.len()));
        let _ = writeln!(body, "Dataset: {}", analysis.dataset);
        let _ = writeln!(body, "Colour scale: {colorbar_label}");
        let _ = writeln!(body, "Grid: {rows} {} x {columns} {}", self.lat_dim, self.lon_dim);
        let _ = writeln!(
            body,
            "Slope range: {min_slope:.6} to {max_slope:.6} (mean {mean_slope:.6})"
        );
        let _ = writeln!(body, "Missing cells drawn as zero: {missing_replaced}");
        if let Some(fraction) = significant_fraction {
            let _ = writeln!(
                body,
                "Cells with p < {}: {:.1}%",
                self.alpha,
                fraction * 100.0
            );
        }

        if self.include_grid {
            let _ = writeln!(body);
            let lons = analysis.longitudes.as_deref();
            let lats = analysis.latitudes.as_deref();
            let header: Vec<String> = (0..columns).map(|j| label(lons, j)).collect();
            let _ = writeln!(body, "{:>10} {}", "lat\\lon", header.join(" "));
            for (i, row) in display.outer_iter().enumerate() {
                let cells: Vec<String> = row.iter().map(|v| format!("{v:>10.4e}")).collect();
                let _ = writeln!(body, "{:>10} {}", label(lats, i), cells.join(" "));
            }
        }

        let _ = writeln!(body);
        let _ = writeln!(body, "{caption}");

        Ok(Figure {
            title,
            colorbar_label,
            caption,
            stats,
            body,
        })
    }
}

fn label(coords: Option<&[f64]>, index: usize) -> String {
    match coords.and_then(|c| c.get(index)) {
        Some(value) => format!("{value:>10.2}"),
        None => format!("{index:>10}"),
    }
}

/// File name of a saved figure: `{var}_{dataset}_{kind}.{format}`
#[must_use]
pub fn figure_file_name(var_name: &str, dataset_name: &str, kind: &str, format: &str) -> String {
    format!("{var_name}_{dataset_name}_{kind}.{format}")
}

/// Write a figure into `save_dir`, creating the directory when needed.
///
/// # Errors
///
/// Returns [`ClimTrendError::IoError`] if the directory or file cannot be written.
pub fn save_figure(
    figure: &Figure,
    var_name: &str,
    dataset_name: &str,
    kind: &str,
    format: &str,
    save_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(save_dir)?;
    let path = save_dir.join(figure_file_name(var_name, dataset_name, kind, format));
    fs::write(&path, &figure.body)?;
    Ok(path)
}
