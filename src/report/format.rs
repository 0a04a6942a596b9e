//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{DatasetStats, FitConfig, FitResult};
use crate::fit::FitSelection;
use crate::io::{FilterReport, IngestedData};

/// Format the run summary (filter counts + fitted-point stats + per-circuit diagnostics).
pub fn format_run_summary(
    ingest: &IngestedData,
    filter: &FilterReport,
    stats: &DatasetStats,
    selection: &FitSelection,
    config: &FitConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== eis - Equivalent Circuit Fit ===\n");
    out.push_str(&format!(
        "File: {} (layout: {:?})\n",
        config.csv_path.display(),
        ingest.layout
    ));
    out.push_str(&format!(
        "Rows: read={} used={} skipped={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    for e in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more\n", ingest.row_errors.len() - 5));
    }

    out.push_str(&format!(
        "Filter: {} -> {} points (first quadrant: -{}, frequency range: -{}){}\n",
        filter.input,
        filter.kept,
        filter.removed_quadrant,
        filter.removed_frequency,
        if config.keep_all { " [keep-all]" } else { "" }
    ));

    let s = stats;
    out.push_str(&format!(
        "Points: n={} | f=[{:.3e}, {:.3e}] Hz | Re=[{:.4}, {:.4}] Ohm | Im=[{:.4}, {:.4}] Ohm\n",
        s.n_points, s.freq_min, s.freq_max, s.re_min, s.re_max, s.im_min, s.im_max
    ));

    out.push_str("\nCircuit diagnostics:\n");
    for fit in &selection.fits {
        let chosen = if fit.circuit == selection.best.circuit { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<28} k={} SSE={:.4e} RMSE={:.4e} BIC={:.3} iters={}{}\n",
            fit.circuit.to_string(),
            fit.circuit.param_count(),
            fit.quality.sse,
            fit.quality.rmse,
            fit.quality.bic,
            fit.quality.iterations,
            if fit.quality.converged { "" } else { " (not converged)" }
        ));
    }
    for (circuit, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {circuit}) {reason}\n"));
    }

    out.push_str(&format!("\nCircuit: {}\n", selection.best.circuit));
    out
}

/// Format the parameter table followed by the mean error line.
pub fn format_parameters(fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("Estimated parameters:\n");
    for ((info, value), conf) in fit.circuit.params().iter().zip(&fit.parameters).zip(&fit.conf) {
        let conf = if conf.is_finite() {
            format!("(+/- {conf:.2e})")
        } else {
            "(+/- n/a)".to_string()
        };
        out.push_str(
            format!("  {:<8} = {:>10.2e} {:<16} [{}]", info.name, value, conf, info.unit)
                .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!("Mean error: {:.6e}\n", fit.quality.mean_abs_error));
    out
}
