//! Circuit element library.
//!
//! Each element maps a small parameter slice and an angular frequency `ω` to a
//! complex impedance:
//!
//! - `R`:   `R`
//! - `C`:   `1 / (jωC)`
//! - `L`:   `jωL`
//! - `W`:   `σ (1 - j) / √ω` (semi-infinite Warburg)
//! - `Wo`:  `Z0 / (√(jωτ) tanh √(jωτ))` (finite-space, open Warburg)
//! - `Ws`:  `Z0 tanh √(jωτ) / √(jωτ)` (finite-length, short Warburg)
//! - `CPE`: `1 / (Q (jω)^α)`

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Smallest value a strictly positive parameter may take during fitting.
pub const PARAM_FLOOR: f64 = 1e-15;

/// Beyond this real part `tanh(x)` is 1 to machine precision.
const TANH_SATURATION: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Resistor,
    Capacitor,
    Inductor,
    Warburg,
    WarburgOpen,
    WarburgShort,
    Cpe,
}

impl ElementKind {
    pub const ALL: [ElementKind; 7] = [
        ElementKind::Resistor,
        ElementKind::Capacitor,
        ElementKind::Inductor,
        ElementKind::Warburg,
        ElementKind::WarburgOpen,
        ElementKind::WarburgShort,
        ElementKind::Cpe,
    ];

    /// Prefix used in circuit strings (`R0`, `Wo1`, `CPE2`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            ElementKind::Resistor => "R",
            ElementKind::Capacitor => "C",
            ElementKind::Inductor => "L",
            ElementKind::Warburg => "W",
            ElementKind::WarburgOpen => "Wo",
            ElementKind::WarburgShort => "Ws",
            ElementKind::Cpe => "CPE",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }

    pub fn param_count(self) -> usize {
        match self {
            ElementKind::Resistor
            | ElementKind::Capacitor
            | ElementKind::Inductor
            | ElementKind::Warburg => 1,
            ElementKind::WarburgOpen | ElementKind::WarburgShort | ElementKind::Cpe => 2,
        }
    }

    pub fn units(self) -> &'static [&'static str] {
        match self {
            ElementKind::Resistor => &["Ohm"],
            ElementKind::Capacitor => &["F"],
            ElementKind::Inductor => &["H"],
            ElementKind::Warburg => &["Ohm sec^-1/2"],
            ElementKind::WarburgOpen | ElementKind::WarburgShort => &["Ohm", "sec"],
            ElementKind::Cpe => &["Ohm^-1 sec^a", ""],
        }
    }

    /// Per-parameter `(lower, upper)` bounds.
    pub fn bounds(self) -> &'static [(f64, f64)] {
        match self {
            ElementKind::Cpe => &[(PARAM_FLOOR, f64::INFINITY), (PARAM_FLOOR, 1.0)],
            ElementKind::WarburgOpen | ElementKind::WarburgShort => {
                &[(PARAM_FLOOR, f64::INFINITY), (PARAM_FLOOR, f64::INFINITY)]
            }
            _ => &[(PARAM_FLOOR, f64::INFINITY)],
        }
    }

    /// Impedance of this element at angular frequency `omega` (rad/s).
    ///
    /// `p` must hold exactly `param_count()` values.
    pub fn impedance(self, p: &[f64], omega: f64) -> Complex64 {
        match self {
            ElementKind::Resistor => Complex64::new(p[0], 0.0),
            ElementKind::Capacitor => Complex64::new(0.0, -1.0 / (omega * p[0])),
            ElementKind::Inductor => Complex64::new(0.0, omega * p[0]),
            ElementKind::Warburg => {
                let a = p[0] / omega.sqrt();
                Complex64::new(a, -a)
            }
            ElementKind::WarburgOpen => {
                let x = Complex64::new(0.0, omega * p[1]).sqrt();
                p[0] / (x * stable_tanh(x))
            }
            ElementKind::WarburgShort => {
                let x = Complex64::new(0.0, omega * p[1]).sqrt();
                p[0] * stable_tanh(x) / x
            }
            ElementKind::Cpe => {
                let alpha = p[1];
                let jw_alpha = Complex64::from_polar(omega.powf(alpha), PI * alpha / 2.0);
                (p[0] * jw_alpha).inv()
            }
        }
    }
}

/// `tanh` that saturates instead of overflowing for large real parts.
fn stable_tanh(x: Complex64) -> Complex64 {
    if x.re.abs() > TANH_SATURATION {
        Complex64::new(x.re.signum(), 0.0)
    } else {
        x.tanh()
    }
}

/// Convert a frequency in Hz to angular frequency.
pub fn angular_frequency(frequency: f64) -> f64 {
    2.0 * PI * frequency
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
        (a - b).norm() <= tol * b.norm().max(1.0)
    }

    #[test]
    fn capacitor_and_inductor_are_purely_reactive() {
        let w = 1000.0;
        let zc = ElementKind::Capacitor.impedance(&[1e-3], w);
        assert!(close(zc, Complex64::new(0.0, -1.0), 1e-12));
        let zl = ElementKind::Inductor.impedance(&[1e-3], w);
        assert!(close(zl, Complex64::new(0.0, 1.0), 1e-12));
    }

    #[test]
    fn warburg_has_45_degree_phase() {
        let z = ElementKind::Warburg.impedance(&[2.0], 4.0);
        assert!((z.re - 1.0).abs() < 1e-12);
        assert!((z.im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn finite_warburgs_approach_semi_infinite_at_high_frequency() {
        // For ωτ >> 1 both Wo and Ws behave like Z0 / √(jωτ).
        let (z0, tau, w) = (3.0, 10.0, 1e4);
        let expected = z0 / Complex64::new(0.0, w * tau).sqrt();
        let zo = ElementKind::WarburgOpen.impedance(&[z0, tau], w);
        let zs = ElementKind::WarburgShort.impedance(&[z0, tau], w);
        assert!(close(zo, expected, 1e-9));
        assert!(close(zs, expected, 1e-9));
    }

    #[test]
    fn finite_warburg_low_frequency_limits() {
        // Ws tends to a resistor Z0; Wo tends to a capacitor-like response.
        let zs = ElementKind::WarburgShort.impedance(&[3.0, 1.0], 1e-6);
        assert!(close(zs, Complex64::new(3.0, 0.0), 1e-6));
        let zo = ElementKind::WarburgOpen.impedance(&[3.0, 1.0], 1e-6);
        assert!(zo.im < -1e5);
    }

    #[test]
    fn warburg_open_is_finite_for_huge_arguments() {
        let z = ElementKind::WarburgOpen.impedance(&[0.1, 10.0], angular_frequency(1e6));
        assert!(z.re.is_finite() && z.im.is_finite());
    }

    #[test]
    fn cpe_with_unit_alpha_is_a_capacitor() {
        let w = 250.0;
        let zq = ElementKind::Cpe.impedance(&[2e-4, 1.0], w);
        let zc = ElementKind::Capacitor.impedance(&[2e-4], w);
        assert!(close(zq, zc, 1e-9));
    }

    #[test]
    fn prefixes_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::from_prefix(kind.prefix()), Some(kind));
            assert_eq!(kind.units().len(), kind.param_count());
            assert_eq!(kind.bounds().len(), kind.param_count());
        }
        assert_eq!(ElementKind::from_prefix("Q"), None);
    }
}
