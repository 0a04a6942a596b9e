//! Low-level fitting routine for a single circuit.
//!
//! Given:
//! - frequencies `f_i`
//! - observed impedances `Z_i`
//! - a circuit and an initial guess
//!
//! we run bounded Levenberg–Marquardt from every start point (parallel) on the
//! stacked residual vector
//!
//! ```text
//! [ w_i (Re Z_fit,i - Re Z_i) ..., w_i (Im Z_fit,i - Im Z_i) ... ]
//! ```
//!
//! and return the best (lowest cost) result.

use log::{debug, warn};
use num_complex::Complex64;
use rayon::prelude::*;

use crate::domain::{ImpedancePoint, Weighting};
use crate::error::AppError;
use crate::fit::starts::start_points;
use crate::math::{LmOptions, LmReport, levenberg_marquardt};
use crate::models::Circuit;

/// Fitting options that affect how each circuit is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub weighting: Weighting,
    pub lm: LmOptions,
    /// Number of start points (the initial guess plus perturbations).
    pub starts: usize,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            weighting: Weighting::Unit,
            lm: LmOptions::default(),
            starts: 1,
            seed: 42,
        }
    }
}

/// Best fit for a single circuit.
#[derive(Debug, Clone)]
pub struct CircuitFit {
    pub circuit: Circuit,
    pub params: Vec<f64>,
    /// One-sigma standard errors (NaN when unavailable).
    pub conf: Vec<f64>,
    /// Weighted sum of squared residuals.
    pub sse: f64,
    /// Mean `|Z - Z_fit|` on the unweighted data.
    pub mean_abs_error: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Index of the winning start point (0 = initial guess).
    pub start_index: usize,
}

/// Fit `circuit` to `points` starting from `guess`.
pub fn fit_circuit(
    circuit: &Circuit,
    points: &[ImpedancePoint],
    guess: &[f64],
    opts: &FitOptions,
) -> Result<CircuitFit, AppError> {
    if points.is_empty() {
        return Err(AppError::new(3, "No data points to fit."));
    }
    circuit.check_params(guess)?;

    let weights = residual_weights(points, opts.weighting);
    let lower: Vec<f64> = circuit.params().iter().map(|p| p.lower).collect();
    let upper: Vec<f64> = circuit.params().iter().map(|p| p.upper).collect();

    let residuals = |p: &[f64]| stacked_residuals(circuit, points, &weights, p);

    let starts = start_points(circuit, guess, opts.starts, opts.seed);

    // Evaluate each start independently (parallel).
    let outcomes: Vec<(usize, Result<LmReport, AppError>)> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, x0)| (idx, levenberg_marquardt(residuals, x0, &lower, &upper, &opts.lm)))
        .collect();

    // Deterministic selection: pick the minimum cost; break ties by start index.
    let mut best: Option<(usize, &LmReport)> = None;
    let mut first_err: Option<&AppError> = None;
    for (idx, outcome) in &outcomes {
        match outcome {
            Ok(report) => {
                debug!(
                    "{circuit}: start {idx} cost={:.6e} iterations={} converged={}",
                    report.cost, report.iterations, report.converged
                );
                let better = match best {
                    None => true,
                    Some((best_idx, b)) => {
                        report.cost < b.cost || (report.cost == b.cost && *idx < best_idx)
                    }
                };
                if better {
                    best = Some((*idx, report));
                }
            }
            Err(err) => {
                debug!("{circuit}: start {idx} failed: {err}");
                first_err.get_or_insert(err);
            }
        }
    }

    let Some((start_index, report)) = best else {
        return Err(first_err
            .cloned()
            .unwrap_or_else(|| AppError::new(4, format!("No valid fit for circuit {circuit}."))));
    };

    if !report.converged {
        warn!(
            "Fit of {circuit} did not converge within {} iterations; reporting the last iterate.",
            opts.lm.max_iters
        );
    }

    let mean_abs_error = mean_abs_error(circuit, points, &report.params)?;

    Ok(CircuitFit {
        circuit: circuit.clone(),
        params: report.params.clone(),
        conf: report.standard_errors(),
        sse: report.cost,
        mean_abs_error,
        iterations: report.iterations,
        converged: report.converged,
        start_index,
    })
}

fn residual_weights(points: &[ImpedancePoint], weighting: Weighting) -> Vec<f64> {
    points
        .iter()
        .map(|p| match weighting {
            Weighting::Unit => 1.0,
            Weighting::Modulus => {
                let m = p.z.norm();
                if m > 0.0 && m.is_finite() { 1.0 / m } else { 1.0 }
            }
        })
        .collect()
}

fn stacked_residuals(
    circuit: &Circuit,
    points: &[ImpedancePoint],
    weights: &[f64],
    params: &[f64],
) -> Option<Vec<f64>> {
    let n = points.len();
    let mut out = vec![0.0; 2 * n];
    for (i, (p, &w)) in points.iter().zip(weights).enumerate() {
        let z_fit = circuit.impedance(params, p.frequency);
        if !(z_fit.re.is_finite() && z_fit.im.is_finite()) {
            return None;
        }
        out[i] = w * (z_fit.re - p.z.re);
        out[n + i] = w * (z_fit.im - p.z.im);
    }
    Some(out)
}

/// `mean(|Z - Z_fit|)` over all points.
pub fn mean_abs_error(circuit: &Circuit, points: &[ImpedancePoint], params: &[f64]) -> Result<f64, AppError> {
    if points.is_empty() {
        return Err(AppError::new(3, "No data points to evaluate."));
    }
    let mut total = 0.0;
    for p in points {
        let z_fit: Complex64 = circuit.impedance(params, p.frequency);
        let e = (p.z - z_fit).norm();
        if !e.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during error computation."));
        }
        total += e;
    }
    Ok(total / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_CIRCUIT, DEFAULT_INITIAL_GUESS};

    fn synthetic(circuit: &Circuit, params: &[f64]) -> Vec<ImpedancePoint> {
        let freqs = crate::math::log_space(0.01, 1e5, 60).unwrap();
        freqs
            .into_iter()
            .map(|f| ImpedancePoint {
                frequency: f,
                z: circuit.impedance(params, f),
            })
            .collect()
    }

    #[test]
    fn recovers_randles_parameters_from_noiseless_data() {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let truth = [10.0, 100.0, 1e-5];
        let points = synthetic(&circuit, &truth);

        let fit = fit_circuit(&circuit, &points, &[5.0, 300.0, 3e-6], &FitOptions::default()).unwrap();

        assert!(fit.converged);
        for (got, want) in fit.params.iter().zip(truth.iter()) {
            assert!(((got - want) / want).abs() < 1e-6, "got {got}, want {want}");
        }
        assert!(fit.mean_abs_error < 1e-6);
    }

    #[test]
    fn default_circuit_reproduces_its_own_spectrum() {
        let circuit = Circuit::parse(DEFAULT_CIRCUIT).unwrap();
        let truth = [0.05, 0.2, 0.5, 0.3, 0.4, 5.0, 2.0];
        let points = synthetic(&circuit, &truth);
        let guess: Vec<f64> = truth.iter().map(|v| v * 1.3).collect();

        let fit = fit_circuit(&circuit, &points, &guess, &FitOptions::default()).unwrap();

        let scale = points.iter().map(|p| p.z.norm()).fold(0.0, f64::max);
        assert!(fit.mean_abs_error < 1e-6 * scale, "mean error {}", fit.mean_abs_error);
        assert_eq!(fit.params.len(), DEFAULT_INITIAL_GUESS.len());
    }

    #[test]
    fn multistart_is_never_worse_than_single_start() {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let truth = [10.0, 100.0, 1e-5];
        let points = synthetic(&circuit, &truth);
        let guess = [1.0, 1.0, 1.0];

        let single = fit_circuit(&circuit, &points, &guess, &FitOptions::default()).unwrap();
        let multi_opts = FitOptions {
            starts: 6,
            ..FitOptions::default()
        };
        let multi = fit_circuit(&circuit, &points, &guess, &multi_opts).unwrap();
        assert!(multi.sse <= single.sse);
    }

    #[test]
    fn iteration_budget_exhaustion_is_reported_not_fatal() {
        let circuit = Circuit::parse("R0-p(R1,C1)").unwrap();
        let points = synthetic(&circuit, &[10.0, 100.0, 1e-5]);
        let opts = FitOptions {
            lm: LmOptions {
                max_iters: 1,
                ..LmOptions::default()
            },
            ..FitOptions::default()
        };

        let fit = fit_circuit(&circuit, &points, &[1.0, 1.0, 1.0], &opts).unwrap();

        assert!(!fit.converged);
        assert!(fit.iterations <= 1);
        assert_eq!(fit.params.len(), 3);
        assert!(fit.sse.is_finite());
    }

    #[test]
    fn modulus_weighting_divides_residuals() {
        let points = vec![ImpedancePoint::new(1.0, 3.0, -4.0)];
        let w = residual_weights(&points, Weighting::Modulus);
        assert!((w[0] - 0.2).abs() < 1e-12);
        let circuit = Circuit::parse("R0").unwrap();
        let r = stacked_residuals(&circuit, &points, &w, &[3.0]).unwrap();
        assert!(r[0].abs() < 1e-12);
        assert!((r[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn guess_length_mismatch_is_a_usage_error() {
        let circuit = Circuit::parse("R0-C1").unwrap();
        let points = vec![ImpedancePoint::new(1.0, 1.0, -1.0)];
        let err = fit_circuit(&circuit, &points, &[1.0], &FitOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_points_are_rejected() {
        let circuit = Circuit::parse("R0").unwrap();
        let err = fit_circuit(&circuit, &[], &[1.0], &FitOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
