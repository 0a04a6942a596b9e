//! Command-line parsing for the EIS circuit fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{CsvLayout, LayoutArg, SortOrder, Weighting};
use crate::models::DEFAULT_CIRCUIT;

pub mod picker;

/// Default data file when neither `-f` nor `EIS_DATA` is given.
pub const DEFAULT_DATA_PATH: &str = "data.csv";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "eis", version, about = "Equivalent-circuit fitting for impedance spectra")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a circuit to a CSV spectrum, print parameters and mean error, and optionally plot/export.
    Fit(FitArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Write a synthetic spectrum generated from a known circuit.
    Synth(SynthArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying fit pipeline as `eis fit`, but renders
    /// Nyquist/Bode charts in a terminal UI using Ratatui.
    Tui(FitArgs),
}

/// Options for fitting (shared by `fit` and `tui`).
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Impedance CSV file.
    #[arg(short = 'f', long = "file", env = "EIS_DATA", default_value = DEFAULT_DATA_PATH)]
    pub file: PathBuf,

    /// Choose the CSV interactively from files under the current directory.
    #[arg(long)]
    pub pick: bool,

    /// CSV layout (auto: headerless numeric rows are plain, otherwise named).
    #[arg(long, value_enum, default_value_t = LayoutArg::Auto)]
    pub layout: LayoutArg,

    /// Keep points outside the first quadrant (Re <= 0 or Im >= 0).
    #[arg(long)]
    pub keep_all: bool,

    /// Drop points below this frequency (Hz).
    #[arg(long)]
    pub freq_min: Option<f64>,

    /// Drop points above this frequency (Hz).
    #[arg(long)]
    pub freq_max: Option<f64>,

    /// Sort points by frequency after filtering.
    #[arg(long, value_enum, default_value_t = SortOrder::None)]
    pub sort: SortOrder,

    /// Circuit string; repeat to compare circuits by BIC.
    #[arg(short = 'c', long = "circuit", env = "EIS_CIRCUIT", default_value = DEFAULT_CIRCUIT)]
    pub circuits: Vec<String>,

    /// Comma-separated initial guess for the first circuit.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub initial_guess: Option<Vec<f64>>,

    /// Residual weighting.
    #[arg(long, value_enum, default_value_t = Weighting::Unit)]
    pub weighting: Weighting,

    /// Number of optimizer starts (1 = initial guess only).
    #[arg(long, default_value_t = 1)]
    pub starts: usize,

    /// Random seed for perturbed starts.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Optimizer iteration budget.
    #[arg(long, default_value_t = 500)]
    pub max_iters: usize,

    /// Relative cost-change tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub ftol: f64,

    /// Relative step-size tolerance.
    #[arg(long, default_value_t = 1e-10)]
    pub xtol: f64,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Add Bode panels (|Z| and phase) to the terminal plot.
    #[arg(long)]
    pub bode: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-point results to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the fit (circuit + params + fitted grid) to JSON.
    #[arg(long = "export-fit")]
    pub export_fit: Option<PathBuf>,

    /// Write a Nyquist + Bode figure as SVG.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `eis fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Add Bode panels.
    #[arg(long)]
    pub bode: bool,

    /// Write an SVG figure instead of printing to the terminal.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for synthetic spectrum generation.
#[derive(Debug, Parser)]
pub struct SynthArgs {
    /// Circuit string.
    #[arg(short = 'c', long, default_value = DEFAULT_CIRCUIT)]
    pub circuit: String,

    /// Comma-separated parameter values (defaults to the standard initial
    /// guess when the default circuit is used).
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Option<Vec<f64>>,

    /// Lowest frequency (Hz).
    #[arg(long, default_value_t = 0.01)]
    pub f_min: f64,

    /// Highest frequency (Hz).
    #[arg(long, default_value_t = 1e5)]
    pub f_max: f64,

    /// Number of frequencies.
    #[arg(long, default_value_t = 60)]
    pub points: usize,

    /// Relative Gaussian noise (fraction of |Z|).
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Output layout.
    #[arg(long, value_enum, default_value_t = CsvLayout::Plain)]
    pub layout: CsvLayout,
}
