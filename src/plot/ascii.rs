//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted curve: `-` line
//!
//! Panels:
//! - Nyquist: `Re(Z)` vs `-Im(Z)`
//! - Bode (optional): `log10 |Z|` and phase `-arg(Z)` (degrees) vs `log10 f`

use crate::domain::{FitFile, FitResult, ImpedancePoint};
use crate::plot::model_curve;

/// Curve samples per output column when drawing a fitted model.
const CURVE_SAMPLES_PER_COLUMN: usize = 4;

struct PanelLabels<'a> {
    title: &'a str,
    x: &'a str,
    x_unit: &'a str,
    y: &'a str,
    y_unit: &'a str,
}

/// Render plots for an in-memory fit result.
pub fn render_ascii_plot(
    points: &[ImpedancePoint],
    fit: &FitResult,
    width: usize,
    height: usize,
    bode: bool,
) -> String {
    let curve = model_curve(fit, points, width.max(2) * CURVE_SAMPLES_PER_COLUMN);
    render_panels(points, &curve, width, height, bode)
}

/// Render plots from a saved fit JSON file (data overlay + precomputed grid).
pub fn render_ascii_plot_from_fit_file(fit: &FitFile, width: usize, height: usize, bode: bool) -> String {
    render_panels(&fit.data.to_points(), &fit.grid.to_points(), width, height, bode)
}

fn render_panels(
    points: &[ImpedancePoint],
    curve: &[ImpedancePoint],
    width: usize,
    height: usize,
    bode: bool,
) -> String {
    let mut out = render_nyquist(points, curve, width, height);
    if bode {
        // Bode panels share the vertical budget.
        let panel_height = (height / 2).max(5);
        out.push('\n');
        out.push_str(&render_bode(points, curve, width, panel_height));
    }
    out
}

/// Nyquist panel: `Re(Z)` on x, `-Im(Z)` on y.
pub fn render_nyquist(points: &[ImpedancePoint], curve: &[ImpedancePoint], width: usize, height: usize) -> String {
    let nyquist = |p: &ImpedancePoint| (p.z.re, -p.z.im);
    render_panel(
        &PanelLabels {
            title: "Nyquist",
            x: "Re(Z)",
            x_unit: " Ohm",
            y: "-Im(Z)",
            y_unit: " Ohm",
        },
        &points.iter().map(nyquist).collect::<Vec<_>>(),
        &curve.iter().map(nyquist).collect::<Vec<_>>(),
        width,
        height,
    )
}

/// Bode panels: magnitude then phase, both against `log10 f`.
pub fn render_bode(points: &[ImpedancePoint], curve: &[ImpedancePoint], width: usize, height: usize) -> String {
    let magnitude = |p: &ImpedancePoint| (p.frequency.log10(), p.z.norm().log10());
    let phase = |p: &ImpedancePoint| (p.frequency.log10(), -p.z.arg().to_degrees());

    let mut out = render_panel(
        &PanelLabels {
            title: "Bode |Z|",
            x: "log10 f",
            x_unit: "",
            y: "log10 |Z|",
            y_unit: "",
        },
        &points.iter().map(magnitude).collect::<Vec<_>>(),
        &curve.iter().map(magnitude).collect::<Vec<_>>(),
        width,
        height,
    );
    out.push('\n');
    out.push_str(&render_panel(
        &PanelLabels {
            title: "Bode phase",
            x: "log10 f",
            x_unit: "",
            y: "-phase",
            y_unit: " deg",
        },
        &points.iter().map(phase).collect::<Vec<_>>(),
        &curve.iter().map(phase).collect::<Vec<_>>(),
        width,
        height,
    ));
    out
}

fn render_panel(
    labels: &PanelLabels,
    points: &[(f64, f64)],
    curve: &[(f64, f64)],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let xs = points.iter().chain(curve).map(|&(x, _)| x);
    let (x_min, x_max) = value_range(xs).unwrap_or((0.0, 1.0));
    let ys = points.iter().chain(curve).map(|&(_, y)| y);
    let (y_min, y_max) = value_range(ys).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);

    for &(x, y) in points {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    // Build final string. We include a small header with ranges.
    let mut out = String::new();
    out.push_str(&format!(
        "{}: {}=[{x_min:.3}, {x_max:.3}]{} | {}=[{y_min:.3}, {y_max:.3}]{}\n",
        labels.title, labels.x, labels.x_unit, labels.y, labels.y_unit
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

/// `(min, max)` over finite values, widened around a single value; `None` when empty.
fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v.is_finite() && max_v.is_finite() && max_v > min_v {
        Some((min_v, max_v))
    } else if min_v.is_finite() {
        let half = (min_v.abs() * 0.5).max(1e-12);
        Some((min_v - half, max_v + half))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        if !(x.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
