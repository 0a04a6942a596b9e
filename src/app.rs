//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit pipeline and prints the parameters and mean error
//! - renders plots and writes optional exports

use std::path::PathBuf;

use clap::Parser;
use log::{debug, warn};

use crate::cli::{Command, FitArgs, PlotArgs, SynthArgs};
use crate::data::{SynthConfig, generate_spectrum, write_spectrum_csv};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::models::{Circuit, DEFAULT_CIRCUIT, DEFAULT_INITIAL_GUESS};

pub mod pipeline;

/// Entry point for the `eis` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` must be loaded before clap reads `EIS_DATA` / `EIS_CIRCUIT`.
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    // `eis` and `eis -f data.csv` behave like `eis fit ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Plot(args) => handle_plot(args),
        Command::Synth(args) => handle_synth(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(&args)?;
    let config = fit_config_from_args(&args, csv_path);
    let run = pipeline::run_fit(&config)?;

    if !run.ingest.row_errors.is_empty() {
        warn!(
            "Skipped {} invalid row(s) in {}",
            run.ingest.row_errors.len(),
            config.csv_path.display()
        );
    }

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.filter, &run.stats, &run.selection, &config)
    );
    println!("{}", crate::report::format_parameters(&run.selection.best));

    if config.plot {
        let plot = crate::plot::render_ascii_plot(
            &run.points,
            &run.selection.best,
            config.plot_width,
            config.plot_height,
            config.bode,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::write_results_csv(path, &run.residuals)?;
        debug!("Wrote per-point results to {}", path.display());
    }
    if let Some(path) = &config.export_fit {
        crate::io::write_fit_json(path, &run.selection.best, &run.points, Some(&config.csv_path))?;
        debug!("Wrote fit JSON to {}", path.display());
    }
    if let Some(path) = &config.svg {
        crate::plot::write_fit_svg(path, &run.points, &run.selection.best)?;
        debug!("Wrote SVG figure to {}", path.display());
    }

    Ok(())
}

fn handle_tui(args: FitArgs) -> Result<(), AppError> {
    let csv_path = resolve_csv_path(&args)?;
    crate::tui::run(fit_config_from_args(&args, csv_path))
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fit = crate::io::read_fit_json(&args.fit)?;

    if let Some(path) = &args.svg {
        crate::plot::write_fit_file_svg(path, &fit)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let plot = crate::plot::render_ascii_plot_from_fit_file(&fit, args.width, args.height, args.bode);
    println!("{plot}");
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let circuit = Circuit::parse(&args.circuit)?;
    let params = match args.params {
        Some(params) => params,
        None if circuit.to_string() == DEFAULT_CIRCUIT => DEFAULT_INITIAL_GUESS.to_vec(),
        None => {
            return Err(AppError::new(
                2,
                format!(
                    "--params is required for circuit `{circuit}` (expects {}: {}).",
                    circuit.param_count(),
                    circuit.param_names().join(", ")
                ),
            ));
        }
    };

    let points = generate_spectrum(&SynthConfig {
        circuit,
        params,
        f_min: args.f_min,
        f_max: args.f_max,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
    })?;
    write_spectrum_csv(&args.output, &points, args.layout)?;

    println!("Wrote {} points to {}", points.len(), args.output.display());
    Ok(())
}

/// Pick the CSV interactively (`--pick`) or validate the given path.
fn resolve_csv_path(args: &FitArgs) -> Result<PathBuf, AppError> {
    if args.pick {
        crate::cli::picker::prompt_for_csv_path()
    } else {
        crate::cli::picker::validate_csv_path(&args.file)
    }
}

pub fn fit_config_from_args(args: &FitArgs, csv_path: PathBuf) -> FitConfig {
    FitConfig {
        csv_path,
        layout: args.layout,
        keep_all: args.keep_all,
        freq_min: args.freq_min,
        freq_max: args.freq_max,
        sort: args.sort,
        circuits: args.circuits.clone(),
        initial_guess: args.initial_guess.clone(),
        weighting: args.weighting,
        starts: args.starts,
        seed: args.seed,
        max_iters: args.max_iters,
        ftol: args.ftol,
        xtol: args.xtol,
        plot: args.plot && !args.no_plot,
        bode: args.bode,
        plot_width: args.width,
        plot_height: args.height,
        export_results: args.export.clone(),
        export_fit: args.export_fit.clone(),
        svg: args.svg.clone(),
    }
}

/// Rewrite argv so `eis` defaults to `eis fit`.
///
/// Rules:
/// - `eis`                      -> `eis fit`
/// - `eis -f data.csv ...`      -> `eis fit -f data.csv ...`
/// - `eis --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "plot" | "synth" | "tui");
    if is_subcommand {
        return argv;
    }

    // A leading flag means "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    argv
}
