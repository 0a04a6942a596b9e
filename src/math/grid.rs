//! Frequency grid generation.
//!
//! EIS sweeps are logarithmic, so fitted curves and synthetic spectra are
//! sampled on log-spaced grids.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::new(
            2,
            format!("Invalid frequency range: min={min}, max={max} (must be finite, >0, and max>min)."),
        ));
    }
    if steps < 2 {
        return Err(AppError::new(2, "Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Log-spaced grid spanning `[min, max]`, widened when the range is degenerate.
pub fn display_grid(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let (mut lo, mut hi) = (min, max);
    if !(lo.is_finite() && hi.is_finite() && lo > 0.0) || hi <= lo {
        let center = if lo.is_finite() && lo > 0.0 { lo } else { 1.0 };
        lo = center / 10.0;
        hi = center * 10.0;
    }
    log_space(lo, hi, steps.max(2)).unwrap_or_else(|_| vec![lo, hi])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert_eq!(log_space(0.0, 10.0, 5).unwrap_err().exit_code(), 2);
        assert_eq!(log_space(10.0, 1.0, 5).unwrap_err().exit_code(), 2);
        assert!(log_space(1.0, 10.0, 1).is_err());
    }

    #[test]
    fn display_grid_widens_single_frequency() {
        let v = display_grid(100.0, 100.0, 3);
        assert!((v[0] - 10.0).abs() < 1e-9);
        assert!((v[2] - 1000.0).abs() < 1e-9);
    }
}
