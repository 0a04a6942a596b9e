//! Circuit selection using BIC with guardrails.
//!
//! The tool fits each candidate circuit and computes, with `m = 2n` residuals
//! (real and imaginary part of every point) and `k` parameters:
//! - SSE / RMSE
//! - AIC = m ln(SSE/m) + 2k
//! - BIC = m ln(SSE/m) + k ln(m)
//!
//! Selection rules:
//! 1. Exclude underdetermined circuits: require `m >= k + 5` when comparing
//!    circuits, `m >= k` for a single circuit
//! 2. Choose the circuit with minimum BIC
//! 3. If a circuit with fewer parameters is within ΔBIC < 2 of the best, pick
//!    the simplest such circuit

use log::info;

use crate::domain::{FitQuality, FitResult, ImpedancePoint};
use crate::error::AppError;
use crate::fit::fitter::{CircuitFit, FitOptions, fit_circuit};
use crate::models::Circuit;

/// Minimum number of extra residuals beyond parameter count.
const MIN_N_BUFFER: usize = 5;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Fits for all attempted circuits (after guardrails).
    pub fits: Vec<FitResult>,
    /// Any circuits that were skipped and why (for diagnostics).
    pub skipped: Vec<(String, String)>,
}

/// A circuit to try, with its starting parameters.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub circuit: Circuit,
    pub guess: Vec<f64>,
}

/// Fit every candidate and select the best circuit.
pub fn fit_and_select(
    points: &[ImpedancePoint],
    candidates: &[Candidate],
    opts: &FitOptions,
) -> Result<FitSelection, AppError> {
    if candidates.is_empty() {
        return Err(AppError::new(2, "No circuit to fit."));
    }

    let n = points.len();
    let m = 2 * n;
    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    // The buffer only matters when BIC has to rank several circuits.
    let buffer = if candidates.len() > 1 { MIN_N_BUFFER } else { 0 };

    for candidate in candidates {
        let k = candidate.circuit.param_count();
        if m < k + buffer {
            let need = if buffer > 0 {
                format!("k+{buffer}={}", k + buffer)
            } else {
                format!("k={k}")
            };
            skipped.push((candidate.circuit.to_string(), format!("Underdetermined: 2n={m} < {need}")));
            continue;
        }

        let fit = fit_circuit(&candidate.circuit, points, &candidate.guess, opts)?;
        fits.push(to_fit_result(fit, n));
    }

    if fits.is_empty() {
        return Err(AppError::new(
            3,
            "Insufficient data to fit any circuit after guardrails.",
        ));
    }

    let best = if fits.len() == 1 {
        fits[0].clone()
    } else {
        let best = select_by_bic(&fits);
        info!("Selected {} by BIC ({:.3})", best.circuit, best.quality.bic);
        best
    };

    Ok(FitSelection {
        best,
        fits,
        skipped,
    })
}

fn to_fit_result(fit: CircuitFit, n: usize) -> FitResult {
    let m = 2 * n;
    let k = fit.circuit.param_count();
    let (aic, bic) = information_criteria(m, fit.sse, k);

    FitResult {
        circuit: fit.circuit,
        parameters: fit.params,
        conf: fit.conf,
        quality: FitQuality {
            sse: fit.sse,
            rmse: (fit.sse / m as f64).sqrt(),
            mean_abs_error: fit.mean_abs_error,
            aic,
            bic,
            n,
            iterations: fit.iterations,
            converged: fit.converged,
        },
    }
}

/// `(AIC, BIC)` for `m` residuals and `k` parameters.
fn information_criteria(m: usize, sse: f64, k: usize) -> (f64, f64) {
    let m_f = m as f64;
    let sse_per = (sse / m_f).max(f64::MIN_POSITIVE);
    let base = m_f * sse_per.ln();
    (base + 2.0 * k as f64, base + (k as f64) * m_f.ln())
}

fn select_by_bic(fits: &[FitResult]) -> FitResult {
    // Minimum BIC; the earlier fit wins exact ties.
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.quality.bic < best.quality.bic {
            best = f;
        }
    }
    let best_bic = best.quality.bic;
    let best_k = best.circuit.param_count();

    // Among strictly simpler circuits within 2 BIC points, take the one with the
    // fewest parameters (then the lowest BIC).
    let mut chosen = best;
    for f in fits {
        let k = f.circuit.param_count();
        if k >= best_k || f.quality.bic >= best_bic + 2.0 {
            continue;
        }
        let chosen_k = chosen.circuit.param_count();
        if k < chosen_k || (k == chosen_k && f.quality.bic < chosen.quality.bic) {
            chosen = f;
        }
    }

    chosen.clone()
}
