//! Data-driven initial guesses for circuits without a user-supplied guess.
//!
//! The heuristics only need to land within a few decades of the answer:
//!
//! - the first resistor takes the high-frequency intercept (`min Re(Z)`)
//! - remaining resistors split the real-axis span evenly
//! - capacitive elements get a time constant at the geometric mid frequency
//! - finite Warburg time constants sit at the lowest measured frequency

use crate::domain::{DatasetStats, ImpedancePoint};
use crate::models::{Circuit, ElementKind, angular_frequency};

const DEFAULT_INDUCTANCE: f64 = 1e-6;
const DEFAULT_CPE_ALPHA: f64 = 0.9;

/// Build an initial guess for `circuit` from the observed spectrum.
pub fn initial_guess(circuit: &Circuit, points: &[ImpedancePoint]) -> Vec<f64> {
    let (re_min, re_span, f_min, f_max) = match DatasetStats::from_points(points) {
        Some(s) => (s.re_min.max(0.0), (s.re_max - s.re_min).abs(), s.freq_min, s.freq_max),
        None => (0.0, 1.0, 1.0, 1.0),
    };

    let n_resistors = circuit.count_kind(ElementKind::Resistor);
    let r_scale = if re_span > 0.0 {
        re_span / n_resistors.saturating_sub(1).max(1) as f64
    } else {
        re_min.max(1.0)
    };
    let f_mid = (f_min * f_max).sqrt().max(f64::MIN_POSITIVE);
    let c_guess = 1.0 / (angular_frequency(f_mid) * r_scale);
    let tau_guess = 1.0 / angular_frequency(f_min.max(f64::MIN_POSITIVE));

    let mut guess = Vec::with_capacity(circuit.param_count());
    let mut first_resistor = true;
    for element in circuit.elements() {
        match element.kind {
            ElementKind::Resistor => {
                if first_resistor && n_resistors > 1 {
                    guess.push(re_min);
                } else {
                    guess.push(r_scale);
                }
                first_resistor = false;
            }
            ElementKind::Capacitor => guess.push(c_guess),
            ElementKind::Inductor => guess.push(DEFAULT_INDUCTANCE),
            ElementKind::Warburg => guess.push(r_scale),
            ElementKind::WarburgOpen | ElementKind::WarburgShort => {
                guess.push(r_scale);
                guess.push(tau_guess);
            }
            ElementKind::Cpe => {
                guess.push(c_guess);
                guess.push(DEFAULT_CPE_ALPHA);
            }
        }
    }

    circuit.clamp_to_bounds(&mut guess);
    guess
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_has_one_value_per_parameter_within_bounds() {
        let circuit = Circuit::parse("R0-p(R1,CPE1)-Wo1-L1-W1").unwrap();
        let points = vec![
            ImpedancePoint::new(1e4, 10.0, -1.0),
            ImpedancePoint::new(1.0, 110.0, -20.0),
        ];
        let guess = initial_guess(&circuit, &points);
        assert_eq!(guess.len(), circuit.param_count());
        for (value, info) in guess.iter().zip(circuit.params()) {
            assert!(value.is_finite());
            assert!(*value >= info.lower && *value <= info.upper, "{} = {value}", info.name);
        }
        // High-frequency intercept goes to the first resistor.
        assert!((guess[0] - 10.0).abs() < 1e-12);
        assert!((guess[1] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn guess_without_points_is_still_finite() {
        let circuit = Circuit::parse("R0-C1").unwrap();
        let guess = initial_guess(&circuit, &[]);
        assert!(guess.iter().all(|v| v.is_finite() && *v > 0.0));
    }
}
