//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> filters -> candidate circuits -> fit/select -> residuals
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use log::info;

use crate::domain::{DatasetStats, FitConfig, ImpedancePoint, ResidualPoint};
use crate::error::AppError;
use crate::fit::{Candidate, FitOptions, FitSelection, fit_and_select};
use crate::io::{FilterOptions, FilterReport, IngestedData, apply_filters, load_spectrum};
use crate::math::LmOptions;
use crate::models::{Circuit, DEFAULT_CIRCUIT, DEFAULT_INITIAL_GUESS, initial_guess};

/// All computed outputs of a single `eis fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub filter: FilterReport,
    /// Points that survived filtering (the ones actually fitted).
    pub points: Vec<ImpedancePoint>,
    pub stats: DatasetStats,
    pub selection: FitSelection,
    pub residuals: Vec<ResidualPoint>,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_spectrum(&config.csv_path, config.layout)?;
    run_fit_with_data(config, ingest)
}

/// Execute the pipeline on already-ingested data.
///
/// This is useful for the TUI where we want to refit without re-reading the file.
pub fn run_fit_with_data(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let (points, filter) = apply_filters(&ingest.points, &filter_options(config))?;
    let stats = DatasetStats::from_points(&points)
        .ok_or_else(|| AppError::new(3, "No data points left after filtering."))?;

    let candidates = build_candidates(config, &points)?;
    let selection = fit_and_select(&points, &candidates, &fit_options(config))?;
    info!(
        "Fitted {} with mean error {:.6e}",
        selection.best.circuit, selection.best.quality.mean_abs_error
    );

    let residuals = crate::report::compute_residuals(&points, &selection.best)?;

    Ok(RunOutput {
        ingest,
        filter,
        points,
        stats,
        selection,
        residuals,
    })
}

pub fn filter_options(config: &FitConfig) -> FilterOptions {
    FilterOptions {
        keep_all: config.keep_all,
        freq_min: config.freq_min,
        freq_max: config.freq_max,
        sort: config.sort,
    }
}

pub fn fit_options(config: &FitConfig) -> FitOptions {
    FitOptions {
        weighting: config.weighting,
        lm: LmOptions {
            max_iters: config.max_iters,
            ftol: config.ftol,
            xtol: config.xtol,
        },
        starts: config.starts.max(1),
        seed: config.seed,
    }
}

/// Parse candidate circuits and pick a starting point for each.
///
/// - an explicit `--initial-guess` applies to the first circuit
/// - the default circuit starts from its standard guess
/// - any other circuit gets a guess derived from the data
pub fn build_candidates(config: &FitConfig, points: &[ImpedancePoint]) -> Result<Vec<Candidate>, AppError> {
    if config.circuits.is_empty() {
        return Err(AppError::new(2, "No circuit given (use --circuit)."));
    }

    let mut out = Vec::with_capacity(config.circuits.len());
    for (idx, raw) in config.circuits.iter().enumerate() {
        let circuit = Circuit::parse(raw)?;
        let guess = match (&config.initial_guess, idx) {
            (Some(guess), 0) => {
                circuit.check_params(guess)?;
                guess.clone()
            }
            _ if circuit.to_string() == DEFAULT_CIRCUIT => DEFAULT_INITIAL_GUESS.to_vec(),
            _ => initial_guess(&circuit, points),
        };
        out.push(Candidate { circuit, guess });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SynthConfig, generate_spectrum, write_spectrum_csv};
    use crate::domain::{CsvLayout, LayoutArg, SortOrder, Weighting};

    fn config(path: std::path::PathBuf, circuits: &[&str]) -> FitConfig {
        FitConfig {
            csv_path: path,
            layout: LayoutArg::Auto,
            keep_all: false,
            freq_min: None,
            freq_max: None,
            sort: SortOrder::None,
            circuits: circuits.iter().map(|s| s.to_string()).collect(),
            initial_guess: None,
            weighting: Weighting::Unit,
            starts: 1,
            seed: 42,
            max_iters: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            plot: false,
            bode: false,
            plot_width: 80,
            plot_height: 25,
            export_results: None,
            export_fit: None,
            svg: None,
        }
    }

    #[test]
    fn candidates_use_standard_guess_for_default_circuit() {
        let cfg = config("x.csv".into(), &[DEFAULT_CIRCUIT, "R0-p(R1,C1)"]);
        let points = vec![ImpedancePoint::new(1.0, 2.0, -1.0), ImpedancePoint::new(100.0, 1.0, -0.1)];
        let candidates = build_candidates(&cfg, &points).unwrap();
        assert_eq!(candidates[0].guess, DEFAULT_INITIAL_GUESS.to_vec());
        assert_eq!(candidates[1].guess.len(), 3);
    }

    #[test]
    fn explicit_guess_is_checked_against_first_circuit() {
        let mut cfg = config("x.csv".into(), &["R0-p(R1,C1)"]);
        cfg.initial_guess = Some(vec![1.0, 2.0]);
        let err = build_candidates(&cfg, &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        cfg.circuits = vec!["R0-p(R1".to_string()];
        assert_eq!(build_candidates(&cfg, &[]).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn end_to_end_fit_on_synthetic_csv() {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let truth = vec![10.0, 100.0, 1e-5];
        let mut points = generate_spectrum(&SynthConfig {
            circuit,
            params: truth.clone(),
            f_min: 0.1,
            f_max: 1e5,
            points: 40,
            noise: 0.0,
            seed: 1,
        })
        .unwrap();
        // An inductive point and a negative-real point that the quadrant filter must drop.
        points.push(ImpedancePoint::new(2e5, 10.0, 0.5));
        points.push(ImpedancePoint::new(3e5, -1.0, -0.5));

        let path = std::env::temp_dir().join(format!("eis-pipeline-{}.csv", std::process::id()));
        write_spectrum_csv(&path, &points, CsvLayout::Named).unwrap();

        let mut cfg = config(path.clone(), &["R0-p(R1,C1)"]);
        cfg.initial_guess = Some(vec![5.0, 300.0, 3e-6]);
        let run = run_fit(&cfg).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(run.filter.removed_quadrant, 2);
        assert_eq!(run.points.len(), 40);
        assert_eq!(run.residuals.len(), 40);
        for (got, want) in run.selection.best.parameters.iter().zip(&truth) {
            assert!(((got - want) / want).abs() < 1e-4, "got {got}, want {want}");
        }
        assert!(crate::report::mean_error(&run.residuals) < 1e-4);
    }
}
