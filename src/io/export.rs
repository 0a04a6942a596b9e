//! Export per-point fit results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::path::Path;

use crate::domain::ResidualPoint;
use crate::error::AppError;

const HEADER: [&str; 6] = ["frequency_hz", "re_obs", "im_obs", "re_fit", "im_fit", "residual_abs"];

/// Write per-point results to a CSV file.
pub fn write_results_csv(path: &Path, residuals: &[ResidualPoint]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(HEADER)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        let p = &r.point;
        writer
            .write_record([
                format!("{:.6e}", p.frequency),
                format!("{:.10e}", p.z.re),
                format!("{:.10e}", p.z.im),
                format!("{:.10e}", r.z_fit.re),
                format!("{:.10e}", r.z_fit.im),
                format!("{:.10e}", r.residual.norm()),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImpedancePoint;
    use num_complex::Complex64;

    #[test]
    fn writes_header_and_one_row_per_point() {
        let point = ImpedancePoint::new(100.0, 3.0, -4.0);
        let z_fit = Complex64::new(3.0, -3.0);
        let residuals = vec![ResidualPoint {
            point,
            z_fit,
            residual: point.z - z_fit,
        }];

        let path = std::env::temp_dir().join(format!("eis-export-{}.csv", std::process::id()));
        write_results_csv(&path, &residuals).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "frequency_hz,re_obs,im_obs,re_fit,im_fit,residual_abs");

        let fields: Vec<f64> = lines[1].split(',').map(|s| s.parse().unwrap()).collect();
        assert_eq!(fields, vec![100.0, 3.0, -4.0, 3.0, -3.0, 1.0]);
    }
}
