//! Optimizer start points.
//!
//! Levenberg–Marquardt is local, and equivalent-circuit fits have plenty of
//! local minima. Besides the initial guess we generate perturbed starts:
//!
//! - unbounded parameters are scaled by `10^u`, `u ~ U(-1, 1)`
//! - parameters with a finite upper bound (CPE exponent) are drawn from
//!   `U(upper / 2, upper)`
//!
//! The RNG is seeded, so a given `(guess, count, seed)` always yields the same starts.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::models::Circuit;

/// Decades of perturbation on either side of the initial guess.
const SPREAD_DECADES: f64 = 1.0;

/// Build `count` start points; the first is always the (clamped) initial guess.
pub fn start_points(circuit: &Circuit, guess: &[f64], count: usize, seed: u64) -> Vec<Vec<f64>> {
    let count = count.max(1);
    let mut base = guess.to_vec();
    circuit.clamp_to_bounds(&mut base);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(count);
    out.push(base.clone());

    for _ in 1..count {
        let mut start: Vec<f64> = base
            .iter()
            .zip(circuit.params())
            .map(|(&value, info)| {
                if info.upper.is_finite() {
                    rng.gen_range(info.upper / 2.0..=info.upper)
                } else {
                    let u: f64 = rng.gen_range(-SPREAD_DECADES..=SPREAD_DECADES);
                    value * 10f64.powf(u)
                }
            })
            .collect();
        circuit.clamp_to_bounds(&mut start);
        out.push(start);
    }

    out
}
