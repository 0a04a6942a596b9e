//! Bounded Levenberg–Marquardt for small nonlinear least squares problems.
//!
//! We minimize `Σ r_i(x)²` for a residual function `r: ℝⁿ → ℝᵐ` with simple box
//! bounds on `x`.
//!
//! Implementation choices:
//! - forward-difference Jacobian (backward near an upper bound)
//! - columns scaled to unit norm before each step (Marquardt scaling), which
//!   keeps parameters spanning many decades (Ohms vs. Farads) well conditioned
//! - trial points are projected onto the bounds
//! - a step is accepted only if it lowers the cost; otherwise λ grows
//!
//! The residual function returns `None` when the model cannot be evaluated
//! (non-finite output); such trial points are treated as rejected steps.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::solve_damped;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// `√ε`, the usual relative forward-difference step.
const FD_REL_STEP: f64 = 1.490_116_119_384_765_6e-8;

/// Relative to the starting value, the smallest scale used for difference steps.
const FD_SCALE_FLOOR: f64 = 1e-6;

/// Absolute floor for the difference-step scale (parameters starting at zero).
const FD_ABS_FLOOR: f64 = 1e-8;

/// Stopping criteria for the optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iters: usize,
    /// Relative cost reduction below which we stop.
    pub ftol: f64,
    /// Relative step size below which we stop.
    pub xtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iters: 500,
            ftol: 1e-12,
            xtol: 1e-12,
        }
    }
}

/// Optimizer output.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    /// Final residual vector.
    pub residuals: Vec<f64>,
    /// `Σ r_i²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Jacobian at `params` (m × n).
    pub jacobian: DMatrix<f64>,
}

impl LmReport {
    /// One-sigma standard errors from `(JᵀJ)⁻¹ · cost / (m - n)`.
    ///
    /// Entries are NaN when the covariance is not available (too few residuals
    /// or a singular Jacobian).
    pub fn standard_errors(&self) -> Vec<f64> {
        let (m, n) = self.jacobian.shape();
        let nan = vec![f64::NAN; n];
        if m <= n {
            return nan;
        }

        let (scaled, scale) = scale_columns(&self.jacobian);
        let Some(inv) = (scaled.transpose() * &scaled).try_inverse() else {
            return nan;
        };

        let s2 = self.cost / (m - n) as f64;
        (0..n)
            .map(|i| {
                let var = inv[(i, i)] / (scale[i] * scale[i]) * s2;
                if var.is_finite() && var >= 0.0 { var.sqrt() } else { f64::NAN }
            })
            .collect()
    }
}

/// Run Levenberg–Marquardt from `x0`.
///
/// `lower`/`upper` must have the same length as `x0`.
pub fn levenberg_marquardt<F>(
    residuals: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &LmOptions,
) -> Result<LmReport, AppError>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let n = x0.len();
    if lower.len() != n || upper.len() != n {
        return Err(AppError::new(4, "Bounds length does not match parameter count."));
    }

    let project = |x: &mut [f64]| {
        for i in 0..x.len() {
            x[i] = x[i].clamp(lower[i], upper[i]);
        }
    };

    let mut x = x0.to_vec();
    project(&mut x);
    let fd_floor: Vec<f64> = x.iter().map(|v| v.abs() * FD_SCALE_FLOOR).collect();

    let mut r = residuals(&x).ok_or_else(|| {
        AppError::new(4, "Model cannot be evaluated at the initial guess (non-finite impedance).")
    })?;
    if r.len() < n {
        return Err(AppError::new(
            3,
            format!("Underdetermined fit: {} residuals for {n} parameters.", r.len()),
        ));
    }
    let mut cost = sum_sq(&r);

    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    'outer: while iterations < opts.max_iters {
        iterations += 1;
        if cost == 0.0 {
            converged = true;
            break;
        }

        let jac = jacobian(&residuals, &x, &r, &fd_floor, upper)?;
        let (scaled, scale) = scale_columns(&jac);
        let rv = DVector::from_column_slice(&r);

        loop {
            let Some(delta_scaled) = solve_damped(&scaled, &rv, lambda) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break 'outer;
                }
                continue;
            };

            let mut trial = x.clone();
            for i in 0..n {
                trial[i] += delta_scaled[i] / scale[i];
            }
            project(&mut trial);

            let step_norm = norm_diff(&trial, &x);
            let x_norm = norm(&x);

            if let Some(r_trial) = residuals(&trial) {
                let cost_trial = sum_sq(&r_trial);
                if cost_trial < cost {
                    let reduction = cost - cost_trial;
                    trace!("lm iter {iterations}: cost {cost:.6e} -> {cost_trial:.6e}, lambda={lambda:.1e}");
                    x = trial;
                    r = r_trial;
                    cost = cost_trial;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if reduction <= opts.ftol * cost.max(f64::MIN_POSITIVE)
                        || step_norm <= opts.xtol * (x_norm + opts.xtol)
                    {
                        converged = true;
                        break 'outer;
                    }
                    continue 'outer;
                }
            }

            if step_norm <= opts.xtol * (x_norm + opts.xtol) {
                // The projected step vanished: we sit on a bound or at a minimum.
                converged = true;
                break 'outer;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No damping produces a decrease: a (local) minimum.
                converged = true;
                break 'outer;
            }
        }
    }

    debug!("lm finished: iterations={iterations}, cost={cost:.6e}, converged={converged}");

    let jacobian = jacobian(&residuals, &x, &r, &fd_floor, upper)?;
    Ok(LmReport {
        params: x,
        residuals: r,
        cost,
        iterations,
        converged,
        jacobian,
    })
}

fn jacobian<F>(
    residuals: &F,
    x: &[f64],
    r: &[f64],
    fd_floor: &[f64],
    upper: &[f64],
) -> Result<DMatrix<f64>, AppError>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let m = r.len();
    let n = x.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut shifted = x.to_vec();

    for j in 0..n {
        let scale = x[j].abs().max(fd_floor[j]).max(FD_ABS_FLOOR);
        let mut h = FD_REL_STEP * scale;
        if x[j] + h > upper[j] {
            h = -h;
        }
        shifted[j] = x[j] + h;
        let r_h = residuals(&shifted).ok_or_else(|| {
            AppError::new(4, "Model became non-finite while estimating the Jacobian.")
        })?;
        shifted[j] = x[j];

        let h_eff = (x[j] + h) - x[j];
        if h_eff == 0.0 {
            continue;
        }
        for i in 0..m {
            jac[(i, j)] = (r_h[i] - r[i]) / h_eff;
        }
    }

    Ok(jac)
}

/// Scale columns to unit norm; returns the scaled matrix and the column norms.
fn scale_columns(jac: &DMatrix<f64>) -> (DMatrix<f64>, Vec<f64>) {
    let mut scaled = jac.clone();
    let mut scale = Vec::with_capacity(jac.ncols());
    for j in 0..jac.ncols() {
        let norm = jac.column(j).norm();
        let s = if norm > 0.0 && norm.is_finite() { norm } else { 1.0 };
        scaled.column_mut(j).scale_mut(1.0 / s);
        scale.push(s);
    }
    (scaled, scale)
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn norm(v: &[f64]) -> f64 {
    sum_sq(v).sqrt()
}

fn norm_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}
