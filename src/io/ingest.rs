//! CSV ingest and normalization.
//!
//! This module is responsible for turning an impedance CSV into a clean list
//! of `(frequency, Z)` points that are safe to fit.
//!
//! Two layouts are supported:
//!
//! - **plain**: no header, columns `frequency, Re(Z), Im(Z)` (extra columns ignored)
//! - **named**: a header with `FREQUENCY(Hz)`, `R(ohm)`, `X(ohm)` in any order
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no filtering or fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::debug;

use crate::domain::{CsvLayout, DatasetStats, ImpedancePoint, LayoutArg};
use crate::error::AppError;

/// Header names required by the named layout (as written by the instrument).
pub const COL_FREQUENCY: &str = "FREQUENCY(Hz)";
pub const COL_REAL: &str = "R(ohm)";
pub const COL_IMAG: &str = "X(ohm)";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// Ingest output: points + resolved layout + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub points: Vec<ImpedancePoint>,
    pub layout: CsvLayout,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Column positions for the three quantities we need.
#[derive(Debug, Clone, Copy)]
struct Columns {
    frequency: usize,
    real: usize,
    imag: usize,
}

const PLAIN_COLUMNS: Columns = Columns {
    frequency: 0,
    real: 1,
    imag: 2,
};

/// Load an impedance spectrum from a CSV file.
pub fn load_spectrum(path: &Path, layout: LayoutArg) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    load_spectrum_from_reader(file, layout)
}

/// Load an impedance spectrum from any reader (used by tests and `load_spectrum`).
pub fn load_spectrum_from_reader<R: Read>(input: R, layout: LayoutArg) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut records = reader.records();

    let first = match records.next() {
        Some(Ok(r)) => r,
        Some(Err(e)) => return Err(AppError::new(2, format!("Failed to read CSV: {e}"))),
        None => return Err(AppError::new(3, "CSV file is empty.")),
    };

    let layout = match layout.to_layout() {
        Some(l) => l,
        None if is_numeric_row(&first) => CsvLayout::Plain,
        None => CsvLayout::Named,
    };
    debug!("ingest: layout resolved to {layout:?}");

    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    let columns = match layout {
        CsvLayout::Named => {
            let header_map = build_header_map(&first);
            ensure_required_columns_exist(&header_map)?
        }
        CsvLayout::Plain => {
            // The first record is data in the plain layout.
            rows_read += 1;
            match parse_row(&first, PLAIN_COLUMNS) {
                Ok(p) => points.push(p),
                Err(message) => row_errors.push(RowError {
                    line: record_line(&first, 1),
                    message,
                }),
            }
            PLAIN_COLUMNS
        }
    };

    for (idx, result) in records.enumerate() {
        // +2 because the first record was consumed above and lines are 1-based.
        let fallback_line = idx as u64 + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line: fallback_line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, columns) {
            Ok(p) => points.push(p),
            Err(message) => row_errors.push(RowError {
                line: record_line(&record, fallback_line),
                message,
            }),
        }
    }

    for e in &row_errors {
        debug!("ingest: skipped line {}: {}", e.line, e.message);
    }

    let rows_used = points.len();
    let stats = DatasetStats::from_points(&points)
        .ok_or_else(|| AppError::new(3, "No valid rows found in CSV."))?;

    debug!("ingest: rows_read={rows_read}, rows_used={rows_used}, row_errors={}", row_errors.len());

    Ok(IngestedData {
        points,
        layout,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn record_line(record: &StringRecord, fallback: u64) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(fallback)
}

fn is_numeric_row(record: &StringRecord) -> bool {
    record.len() >= 3 && record.iter().take(3).all(|f| f.parse::<f64>().is_ok())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(header_map: &HashMap<String, usize>) -> Result<Columns, AppError> {
    let lookup = |col: &str| header_map.get(&col.to_ascii_lowercase()).copied();

    let missing: Vec<String> = [COL_FREQUENCY, COL_REAL, COL_IMAG]
        .iter()
        .filter(|c| lookup(c).is_none())
        .map(|c| format!("`{c}`"))
        .collect();

    match (lookup(COL_FREQUENCY), lookup(COL_REAL), lookup(COL_IMAG)) {
        (Some(frequency), Some(real), Some(imag)) => Ok(Columns { frequency, real, imag }),
        _ => Err(AppError::new(
            2,
            format!("Missing required column(s): {}", missing.join(", ")),
        )),
    }
}

fn parse_row(record: &StringRecord, columns: Columns) -> Result<ImpedancePoint, String> {
    let frequency = parse_field(record, columns.frequency, "frequency")?;
    let re = parse_field(record, columns.real, "real part")?;
    let im = parse_field(record, columns.imag, "imaginary part")?;

    if frequency <= 0.0 {
        return Err(format!("Non-positive frequency: {frequency}"));
    }
    Ok(ImpedancePoint::new(frequency, re, im))
}

fn parse_field(record: &StringRecord, idx: usize, label: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing {label} (column {}).", idx + 1))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid {label} '{raw}'."))?;
    if !value.is_finite() {
        return Err(format!("Non-finite {label}."));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_layout_maps_columns_into_complex_values() {
        let csv = "1000,10.5,-2.25\n100,12.0,-8.5\n10,20.0,-15.0\n";
        let data = load_spectrum_from_reader(csv.as_bytes(), LayoutArg::Auto).unwrap();

        assert_eq!(data.layout, CsvLayout::Plain);
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.rows_used, 3);
        assert_eq!(data.points[0], ImpedancePoint::new(1000.0, 10.5, -2.25));
        assert_eq!(data.points[2], ImpedancePoint::new(10.0, 20.0, -15.0));
        assert_eq!(data.stats.freq_min, 10.0);
        assert_eq!(data.stats.re_max, 20.0);
    }

    #[test]
    fn named_layout_accepts_any_column_order_and_bom() {
        let csv = "\u{feff}X(ohm), FREQUENCY(Hz) ,R(ohm),note\n-1.5,50,3.0,a\n-0.5,500,2.0,b\n";
        let data = load_spectrum_from_reader(csv.as_bytes(), LayoutArg::Auto).unwrap();

        assert_eq!(data.layout, CsvLayout::Named);
        assert_eq!(data.rows_read, 2);
        assert_eq!(data.points[0], ImpedancePoint::new(50.0, 3.0, -1.5));
        assert_eq!(data.points[1], ImpedancePoint::new(500.0, 2.0, -0.5));
    }

    #[test]
    fn missing_named_columns_are_fatal() {
        let csv = "FREQUENCY(Hz),R(ohm)\n1,2\n";
        let err = load_spectrum_from_reader(csv.as_bytes(), LayoutArg::Auto).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("`X(ohm)`"), "{err}");
        assert!(!err.to_string().contains("`R(ohm)`"), "{err}");
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "1000,1,-1\nabc,1,-1\n10,1\n-5,1,-1\n1,2,-2\n";
        let data = load_spectrum_from_reader(csv.as_bytes(), LayoutArg::Plain).unwrap();

        assert_eq!(data.rows_read, 5);
        assert_eq!(data.rows_used, 2);
        let lines: Vec<u64> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn forced_plain_layout_reports_header_as_row_error() {
        let csv = "FREQUENCY(Hz),R(ohm),X(ohm)\n10,1,-1\n";
        let data = load_spectrum_from_reader(csv.as_bytes(), LayoutArg::Plain).unwrap();
        assert_eq!(data.rows_used, 1);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 1);
    }

    #[test]
    fn empty_or_all_invalid_input_has_no_data() {
        let err = load_spectrum_from_reader("".as_bytes(), LayoutArg::Auto).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        let err = load_spectrum_from_reader("x,y,z\n".as_bytes(), LayoutArg::Plain).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn load_spectrum_reports_missing_file() {
        let err = load_spectrum(Path::new("/definitely/not/here.csv"), LayoutArg::Auto).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
