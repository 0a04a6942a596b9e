//! Read/write fit JSON files.
//!
//! A fit file is the portable representation of a fitted circuit:
//! - circuit string + named parameters (value, unit, 1-sigma)
//! - fit quality diagnostics
//! - the points used for the fit
//! - a precomputed model grid for quick re-plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{FitFile, FitResult, ImpedancePoint, ParamEntry, SpectrumGrid};
use crate::error::AppError;
use crate::plot::model_curve;

/// Number of frequencies in the saved model grid.
const GRID_POINTS: usize = 200;

/// Build the fit file contents for `best` fitted to `points`.
pub fn build_fit_file(best: &FitResult, points: &[ImpedancePoint], source: Option<&Path>) -> FitFile {
    let parameters = best
        .circuit
        .params()
        .iter()
        .zip(&best.parameters)
        .zip(&best.conf)
        .map(|((info, &value), &conf)| ParamEntry {
            name: info.name.clone(),
            unit: info.unit.to_string(),
            value,
            conf: conf.is_finite().then_some(conf),
        })
        .collect();

    let grid_points = model_curve(best, points, GRID_POINTS);

    FitFile {
        tool: "eis".to_string(),
        generated_at: Utc::now(),
        source: source.map(|p| p.display().to_string()),
        circuit: best.circuit.to_string(),
        parameters,
        fit_quality: best.quality.clone(),
        data: SpectrumGrid::from_points(points),
        grid: SpectrumGrid::from_points(&grid_points),
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(
    path: &Path,
    best: &FitResult,
    points: &[ImpedancePoint],
    source: Option<&Path>,
) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;

    let fit = build_fit_file(best, points, source);
    serde_json::to_writer_pretty(file, &fit)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;

    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;

    let grid_ok = |g: &SpectrumGrid| g.frequency.len() == g.re.len() && g.frequency.len() == g.im.len();
    if !grid_ok(&fit.data) || !grid_ok(&fit.grid) {
        return Err(AppError::new(2, "Invalid fit JSON: grid columns have different lengths."));
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitQuality;
    use crate::models::Circuit;

    fn fit_result() -> FitResult {
        FitResult {
            circuit: Circuit::parse("R0-p(R1,C1)").unwrap(),
            parameters: vec![10.0, 100.0, 1e-5],
            conf: vec![0.1, f64::NAN, 1e-7],
            quality: FitQuality {
                sse: 0.5,
                rmse: 0.1,
                mean_abs_error: 0.2,
                aic: -1.0,
                bic: 1.0,
                n: 3,
                iterations: 12,
                converged: true,
            },
        }
    }

    #[test]
    fn fit_file_carries_named_parameters_and_grid() {
        let points = vec![
            ImpedancePoint::new(1000.0, 10.5, -5.0),
            ImpedancePoint::new(10.0, 100.0, -20.0),
        ];
        let fit = build_fit_file(&fit_result(), &points, None);

        assert_eq!(fit.circuit, "R0-p(R1,C1)");
        let names: Vec<&str> = fit.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["R0", "R1", "C1"]);
        assert_eq!(fit.parameters[0].unit, "Ohm");
        assert_eq!(fit.parameters[1].conf, None);
        assert_eq!(fit.data.frequency, vec![1000.0, 10.0]);
        assert_eq!(fit.grid.frequency.len(), GRID_POINTS);
        assert!((fit.grid.frequency[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn write_then_read_preserves_contents() {
        let points = vec![
            ImpedancePoint::new(1000.0, 10.5, -5.0),
            ImpedancePoint::new(10.0, 100.0, -20.0),
        ];
        let path = std::env::temp_dir().join(format!("eis-fit-{}.json", std::process::id()));
        write_fit_json(&path, &fit_result(), &points, Some(Path::new("data.csv"))).unwrap();
        let fit = read_fit_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(fit.tool, "eis");
        assert_eq!(fit.source.as_deref(), Some("data.csv"));
        assert_eq!(fit.fit_quality.iterations, 12);
        assert_eq!(fit.data.to_points(), points);
    }

    #[test]
    fn invalid_json_is_a_usage_error() {
        let path = std::env::temp_dir().join(format!("eis-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_fit_json(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert_eq!(err.exit_code(), 2);
    }
}
