//! Synthetic impedance spectra from a known circuit.
//!
//! Frequencies are log-spaced and written high to low, the way instruments sweep.
//! Noise is Gaussian and proportional to `|Z|`, applied independently to the
//! real and imaginary parts.

use std::fs::File;
use std::path::Path;

use num_complex::Complex64;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CsvLayout, ImpedancePoint};
use crate::error::AppError;
use crate::io::ingest::{COL_FREQUENCY, COL_IMAG, COL_REAL};
use crate::math::log_space;
use crate::models::Circuit;

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub circuit: Circuit,
    pub params: Vec<f64>,
    pub f_min: f64,
    pub f_max: f64,
    pub points: usize,
    /// Relative noise level (standard deviation as a fraction of `|Z|`).
    pub noise: f64,
    pub seed: u64,
}

pub fn generate_spectrum(config: &SynthConfig) -> Result<Vec<ImpedancePoint>, AppError> {
    config.circuit.check_params(&config.params)?;
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Noise level must be finite and >= 0."));
    }

    let mut frequencies = log_space(config.f_min, config.f_max, config.points)?;
    frequencies.reverse();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut out = Vec::with_capacity(frequencies.len());
    for frequency in frequencies {
        let z = config.circuit.impedance(&config.params, frequency);
        if !(z.re.is_finite() && z.im.is_finite()) {
            return Err(AppError::new(
                4,
                format!("Non-finite impedance at {frequency} Hz for circuit {}.", config.circuit),
            ));
        }

        let sigma = config.noise * z.norm();
        let noise = Complex64::new(normal.sample(&mut rng), normal.sample(&mut rng)) * sigma;
        out.push(ImpedancePoint {
            frequency,
            z: z + noise,
        });
    }

    Ok(out)
}

/// Write a spectrum as CSV in the requested layout (readable by `io::ingest`).
pub fn write_spectrum_csv(path: &Path, points: &[ImpedancePoint], layout: CsvLayout) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write CSV: {e}"));

    if layout == CsvLayout::Named {
        writer
            .write_record([COL_FREQUENCY, COL_REAL, COL_IMAG])
            .map_err(write_err)?;
    }
    for p in points {
        writer
            .write_record([
                format!("{:.6e}", p.frequency),
                format!("{:.10e}", p.z.re),
                format!("{:.10e}", p.z.im),
            ])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LayoutArg;
    use crate::io::ingest::load_spectrum;

    fn config(noise: f64) -> SynthConfig {
        SynthConfig {
            circuit: Circuit::parse("R0-p(R1,C1)").unwrap(),
            params: vec![10.0, 100.0, 1e-5],
            f_min: 0.1,
            f_max: 1e5,
            points: 31,
            noise,
            seed: 7,
        }
    }

    #[test]
    fn noiseless_spectrum_matches_model_and_sweeps_downward() {
        let cfg = config(0.0);
        let points = generate_spectrum(&cfg).unwrap();
        assert_eq!(points.len(), 31);
        assert!((points[0].frequency - 1e5).abs() < 1e-6);
        assert!(points.windows(2).all(|w| w[0].frequency > w[1].frequency));
        for p in &points {
            assert_eq!(p.z, cfg.circuit.impedance(&cfg.params, p.frequency));
        }
    }

    #[test]
    fn noise_is_seeded_and_relative() {
        let a = generate_spectrum(&config(0.01)).unwrap();
        let b = generate_spectrum(&config(0.01)).unwrap();
        assert_eq!(a, b);

        let cfg = config(0.01);
        for p in &a {
            let clean = cfg.circuit.impedance(&cfg.params, p.frequency);
            assert!((p.z - clean).norm() < 0.1 * clean.norm());
        }
    }

    #[test]
    fn wrong_param_count_and_negative_noise_are_rejected() {
        let mut cfg = config(0.0);
        cfg.params.pop();
        assert_eq!(generate_spectrum(&cfg).unwrap_err().exit_code(), 2);
        assert_eq!(generate_spectrum(&config(-1.0)).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn written_csv_is_readable_in_both_layouts() {
        let points = generate_spectrum(&config(0.0)).unwrap();
        for (layout, arg) in [(CsvLayout::Plain, LayoutArg::Auto), (CsvLayout::Named, LayoutArg::Auto)] {
            let path = std::env::temp_dir().join(format!("eis-synth-{:?}-{}.csv", layout, std::process::id()));
            write_spectrum_csv(&path, &points, layout).unwrap();
            let data = load_spectrum(&path, arg).unwrap();
            let _ = std::fs::remove_file(&path);

            assert_eq!(data.layout, layout);
            assert_eq!(data.rows_used, points.len());
            let rel = (data.points[5].z - points[5].z).norm() / points[5].z.norm();
            assert!(rel < 1e-9);
        }
    }
}
