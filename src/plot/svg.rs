//! SVG figure output (Nyquist + Bode) via Plotters.
//!
//! Layout: Nyquist on the left half; `|Z|` and phase stacked on the right,
//! both against a log frequency axis.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{FitFile, FitResult, ImpedancePoint};
use crate::error::AppError;
use crate::plot::model_curve;

const SVG_WIDTH: u32 = 1200;
const SVG_HEIGHT: u32 = 700;
const CURVE_SAMPLES: usize = 300;

const DATA_COLOR: RGBColor = RGBColor(31, 119, 180);
const FIT_COLOR: RGBColor = RGBColor(214, 39, 40);

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Write a figure for an in-memory fit.
pub fn write_fit_svg(path: &Path, points: &[ImpedancePoint], fit: &FitResult) -> Result<(), AppError> {
    let curve = model_curve(fit, points, CURVE_SAMPLES);
    write_svg(path, points, &curve, &fit.circuit.to_string())
}

/// Write a figure from a saved fit JSON file.
pub fn write_fit_file_svg(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    write_svg(path, &fit.data.to_points(), &fit.grid.to_points(), &fit.circuit)
}

/// Write a Nyquist + Bode figure with measured points and a model curve.
pub fn write_svg(
    path: &Path,
    points: &[ImpedancePoint],
    curve: &[ImpedancePoint],
    title: &str,
) -> Result<(), AppError> {
    if points.is_empty() && curve.is_empty() {
        return Err(AppError::new(3, "Nothing to plot."));
    }

    let root = SVGBackend::new(path, (SVG_WIDTH, SVG_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let root = root.titled(title, ("sans-serif", 22)).map_err(plot_err)?;

    let (left, right) = root.split_horizontally((SVG_WIDTH / 2) as i32);
    let bode = right.split_evenly((2, 1));

    draw_nyquist(&left, points, curve)?;
    draw_magnitude(&bode[0], points, curve)?;
    draw_phase(&bode[1], points, curve)?;

    root.present()
        .map_err(|e| AppError::new(2, format!("Failed to write SVG '{}': {e}", path.display())))?;
    Ok(())
}

fn draw_nyquist(area: &Area, points: &[ImpedancePoint], curve: &[ImpedancePoint]) -> Result<(), AppError> {
    let xy = |p: &ImpedancePoint| (p.z.re, -p.z.im);
    let (x0, x1) = padded_range(points.iter().chain(curve).map(|p| xy(p).0));
    let (y0, y1) = padded_range(points.iter().chain(curve).map(|p| xy(p).1));

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Nyquist", ("sans-serif", 18))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Re(Z) [Ohm]")
        .y_desc("-Im(Z) [Ohm]")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(curve.iter().map(xy), &FIT_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(xy(p), 3, DATA_COLOR.filled())))
        .map_err(plot_err)?;
    Ok(())
}

fn draw_magnitude(area: &Area, points: &[ImpedancePoint], curve: &[ImpedancePoint]) -> Result<(), AppError> {
    let xy = |p: &ImpedancePoint| (p.frequency, p.z.norm());
    let (f0, f1) = log_range(points.iter().chain(curve).map(|p| p.frequency));
    let (m0, m1) = log_range(points.iter().chain(curve).map(|p| p.z.norm()));

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Bode |Z|", ("sans-serif", 16))
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d((f0..f1).log_scale(), (m0..m1).log_scale())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("f [Hz]")
        .y_desc("|Z| [Ohm]")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(curve.iter().map(xy), &FIT_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(xy(p), 3, DATA_COLOR.filled())))
        .map_err(plot_err)?;
    Ok(())
}

fn draw_phase(area: &Area, points: &[ImpedancePoint], curve: &[ImpedancePoint]) -> Result<(), AppError> {
    let xy = |p: &ImpedancePoint| (p.frequency, -p.z.arg().to_degrees());
    let (f0, f1) = log_range(points.iter().chain(curve).map(|p| p.frequency));
    let (y0, y1) = padded_range(points.iter().chain(curve).map(|p| xy(p).1));

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption("Bode phase", ("sans-serif", 16))
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d((f0..f1).log_scale(), y0..y1)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("f [Hz]")
        .y_desc("-phase [deg]")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(curve.iter().map(xy), &FIT_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|p| Circle::new(xy(p), 3, DATA_COLOR.filled())))
        .map_err(plot_err)?;
    Ok(())
}

fn plot_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::new(2, format!("Failed to draw SVG: {e}"))
}

/// Linear range with 5% padding (non-degenerate).
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = finite_min_max(values.filter(|v| v.is_finite())).unwrap_or((0.0, 1.0));
    let span = hi - lo;
    let pad = if span > 0.0 { span * 0.05 } else { lo.abs().max(1.0) * 0.5 };
    (lo - pad, hi + pad)
}

/// Positive range for log axes, widened by a quarter decade on each side.
fn log_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = finite_min_max(values.filter(|v| v.is_finite() && *v > 0.0)).unwrap_or((1.0, 10.0));
    let factor = 10f64.powf(0.25);
    (lo / factor, hi * factor)
}

fn finite_min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
