//! Nyquist and Bode plots.
//!
//! - terminal ASCII panels (`ascii`)
//! - SVG figures via Plotters (`svg`)

use crate::domain::{FitResult, ImpedancePoint};
use crate::math::display_grid;

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

/// Evaluate a fitted circuit on a log-spaced grid covering the data's frequency range.
pub fn model_curve(fit: &FitResult, points: &[ImpedancePoint], samples: usize) -> Vec<ImpedancePoint> {
    let (f_min, f_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.frequency), hi.max(p.frequency))
        });
    let frequencies = display_grid(f_min, f_max, samples);
    frequencies
        .iter()
        .zip(fit.predict(&frequencies))
        .map(|(&frequency, z)| ImpedancePoint { frequency, z })
        .collect()
}
