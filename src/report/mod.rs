//! Reporting utilities: residuals and formatted terminal output.

use crate::domain::{FitResult, ImpedancePoint, ResidualPoint};
use crate::error::AppError;

pub mod format;

pub use format::*;

/// Compute fitted values and complex residuals for each point.
pub fn compute_residuals(points: &[ImpedancePoint], fit: &FitResult) -> Result<Vec<ResidualPoint>, AppError> {
    let mut out = Vec::with_capacity(points.len());
    for p in points {
        let z_fit = fit.circuit.impedance(&fit.parameters, p.frequency);
        if !(z_fit.re.is_finite() && z_fit.im.is_finite()) {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(ResidualPoint {
            point: *p,
            z_fit,
            residual: p.z - z_fit,
        });
    }
    Ok(out)
}

/// `mean(|Z - Z_fit|)`; zero for an empty slice.
pub fn mean_error(residuals: &[ResidualPoint]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    residuals.iter().map(|r| r.residual.norm()).sum::<f64>() / residuals.len() as f64
}
