//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during ingest, filtering and fitting
//! - exported to CSV/JSON
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::models::Circuit;

/// One measured (or synthetic) impedance sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedancePoint {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Complex impedance in Ohm (`re` = resistance, `im` = reactance).
    pub z: Complex64,
}

impl ImpedancePoint {
    pub fn new(frequency: f64, re: f64, im: f64) -> Self {
        Self {
            frequency,
            z: Complex64::new(re, im),
        }
    }
}

/// Split points into parallel frequency / impedance sequences.
pub fn split_points(points: &[ImpedancePoint]) -> (Vec<f64>, Vec<Complex64>) {
    points.iter().map(|p| (p.frequency, p.z)).unzip()
}

/// Summary stats about the points actually used for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_points: usize,
    pub freq_min: f64,
    pub freq_max: f64,
    pub re_min: f64,
    pub re_max: f64,
    pub im_min: f64,
    pub im_max: f64,
}

impl DatasetStats {
    pub fn from_points(points: &[ImpedancePoint]) -> Option<Self> {
        let first = points.first()?;
        let mut stats = Self {
            n_points: points.len(),
            freq_min: first.frequency,
            freq_max: first.frequency,
            re_min: first.z.re,
            re_max: first.z.re,
            im_min: first.z.im,
            im_max: first.z.im,
        };
        for p in &points[1..] {
            stats.freq_min = stats.freq_min.min(p.frequency);
            stats.freq_max = stats.freq_max.max(p.frequency);
            stats.re_min = stats.re_min.min(p.z.re);
            stats.re_max = stats.re_max.max(p.z.re);
            stats.im_min = stats.im_min.min(p.z.im);
            stats.im_max = stats.im_max.max(p.z.im);
        }
        Some(stats)
    }
}

/// Requested CSV layout.
///
/// `Auto` means: headerless numeric rows are `Plain`, anything else is `Named`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutArg {
    Auto,
    Plain,
    Named,
}

/// Concrete layout actually used after resolving `LayoutArg::Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CsvLayout {
    /// No header; columns are `frequency, Re(Z), Im(Z)`.
    Plain,
    /// Header with `FREQUENCY(Hz)`, `R(ohm)`, `X(ohm)`.
    Named,
}

impl LayoutArg {
    pub fn to_layout(self) -> Option<CsvLayout> {
        match self {
            LayoutArg::Auto => None,
            LayoutArg::Plain => Some(CsvLayout::Plain),
            LayoutArg::Named => Some(CsvLayout::Named),
        }
    }
}

/// Optional frequency ordering applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Keep file order.
    None,
    Ascending,
    Descending,
}

/// How residuals are weighted in the fit objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Plain residuals on real and imaginary parts.
    Unit,
    /// Residuals divided by the measured `|Z|` (proportional weighting).
    Modulus,
}

/// A per-point fitted result (used for reporting and exports).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualPoint {
    pub point: ImpedancePoint,
    pub z_fit: Complex64,
    /// `z - z_fit`.
    pub residual: Complex64,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Sum of squared (weighted) residuals over real and imaginary parts.
    pub sse: f64,
    pub rmse: f64,
    /// `mean(|Z - Z_fit|)` on the unweighted data.
    pub mean_abs_error: f64,
    pub aic: f64,
    pub bic: f64,
    /// Number of impedance points (each contributes two residuals).
    pub n: usize,
    pub iterations: usize,
    pub converged: bool,
}

/// Fit output for a single circuit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub circuit: Circuit,
    pub parameters: Vec<f64>,
    /// One-sigma standard errors; NaN when the covariance is unavailable.
    pub conf: Vec<f64>,
    pub quality: FitQuality,
}

impl FitResult {
    pub fn predict(&self, frequencies: &[f64]) -> Vec<Complex64> {
        self.circuit.predict(&self.parameters, frequencies)
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults and environment).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub csv_path: PathBuf,
    pub layout: LayoutArg,

    /// Skip the first-quadrant filter.
    pub keep_all: bool,
    pub freq_min: Option<f64>,
    pub freq_max: Option<f64>,
    pub sort: SortOrder,

    /// Candidate circuits; more than one triggers BIC selection.
    pub circuits: Vec<String>,
    /// Initial guess for the first circuit (derived from data when absent).
    pub initial_guess: Option<Vec<f64>>,
    pub weighting: Weighting,

    /// Number of optimizer starts (1 = initial guess only).
    pub starts: usize,
    pub seed: u64,
    pub max_iters: usize,
    pub ftol: f64,
    pub xtol: f64,

    pub plot: bool,
    pub bode: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
    pub svg: Option<PathBuf>,
}

/// One fitted parameter as written to a fit file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    pub unit: String,
    pub value: f64,
    /// `None` when the standard error could not be estimated.
    pub conf: Option<f64>,
}

/// Frequencies with matching complex impedances, split into columns for JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumGrid {
    pub frequency: Vec<f64>,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
}

impl SpectrumGrid {
    pub fn from_points(points: &[ImpedancePoint]) -> Self {
        Self {
            frequency: points.iter().map(|p| p.frequency).collect(),
            re: points.iter().map(|p| p.z.re).collect(),
            im: points.iter().map(|p| p.z.im).collect(),
        }
    }

    pub fn to_points(&self) -> Vec<ImpedancePoint> {
        self.frequency
            .iter()
            .zip(&self.re)
            .zip(&self.im)
            .map(|((&f, &re), &im)| ImpedancePoint::new(f, re, im))
            .collect()
    }
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub source: Option<String>,
    pub circuit: String,
    pub parameters: Vec<ParamEntry>,
    pub fit_quality: FitQuality,
    /// Points used for the fit.
    pub data: SpectrumGrid,
    /// Fitted model on a dense log-spaced frequency grid.
    pub grid: SpectrumGrid,
}
