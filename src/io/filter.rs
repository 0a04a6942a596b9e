//! Point filters applied between ingest and fitting.
//!
//! Stages run in a fixed order:
//!
//! 1. first-quadrant selection (`Re(Z) > 0`, `Im(Z) < 0`), unless `--keep-all`
//! 2. frequency crop (`--freq-min` / `--freq-max`)
//! 3. frequency sort (`--sort`)
//!
//! Each stage reports how many points it removed.

use log::debug;

use crate::domain::{ImpedancePoint, SortOrder};
use crate::error::AppError;

/// Per-stage counts for the filter pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub removed_quadrant: usize,
    pub removed_frequency: usize,
    pub kept: usize,
}

/// Filter settings (derived from CLI flags).
#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    pub keep_all: bool,
    pub freq_min: Option<f64>,
    pub freq_max: Option<f64>,
    pub sort: SortOrder,
}

/// Keep only points in the capacitive quadrant: positive real part and
/// negative imaginary part (above the x-axis of a Nyquist plot).
pub fn ignore_below_x(points: &[ImpedancePoint]) -> Vec<ImpedancePoint> {
    points
        .iter()
        .filter(|p| p.z.re > 0.0 && p.z.im < 0.0)
        .copied()
        .collect()
}

/// Keep points with `min <= f <= max`; missing bounds are open.
pub fn crop_frequencies(points: &[ImpedancePoint], min: Option<f64>, max: Option<f64>) -> Vec<ImpedancePoint> {
    points
        .iter()
        .filter(|p| min.is_none_or(|lo| p.frequency >= lo) && max.is_none_or(|hi| p.frequency <= hi))
        .copied()
        .collect()
}

/// Stable sort by frequency.
pub fn sort_by_frequency(points: &mut [ImpedancePoint], order: SortOrder) {
    match order {
        SortOrder::None => {}
        SortOrder::Ascending => points.sort_by(|a, b| a.frequency.total_cmp(&b.frequency)),
        SortOrder::Descending => points.sort_by(|a, b| b.frequency.total_cmp(&a.frequency)),
    }
}

/// Run all stages and fail if nothing survives.
pub fn apply_filters(
    points: &[ImpedancePoint],
    opts: &FilterOptions,
) -> Result<(Vec<ImpedancePoint>, FilterReport), AppError> {
    if let (Some(lo), Some(hi)) = (opts.freq_min, opts.freq_max) {
        if lo > hi {
            return Err(AppError::new(
                2,
                format!("Invalid frequency range: --freq-min {lo} > --freq-max {hi}."),
            ));
        }
    }

    let input = points.len();

    let quadrant = if opts.keep_all {
        points.to_vec()
    } else {
        ignore_below_x(points)
    };
    let removed_quadrant = input - quadrant.len();

    let mut kept = crop_frequencies(&quadrant, opts.freq_min, opts.freq_max);
    let removed_frequency = quadrant.len() - kept.len();

    sort_by_frequency(&mut kept, opts.sort);

    let report = FilterReport {
        input,
        removed_quadrant,
        removed_frequency,
        kept: kept.len(),
    };
    debug!("filter: {report:?}");

    if kept.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No data points left after filtering ({input} read, {removed_quadrant} outside the first quadrant, {removed_frequency} outside the frequency range)."
            ),
        ));
    }

    Ok((kept, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts() -> Vec<ImpedancePoint> {
        vec![
            ImpedancePoint::new(1000.0, 1.0, -0.5),
            ImpedancePoint::new(500.0, 1.2, 0.3),  // inductive
            ImpedancePoint::new(100.0, -0.1, -0.2), // negative real
            ImpedancePoint::new(50.0, 1.5, 0.0),   // on the axis
            ImpedancePoint::new(10.0, 2.0, -1.0),
            ImpedancePoint::new(1.0, 0.0, -2.0),   // zero real
        ]
    }

    #[test]
    fn quadrant_filter_removes_every_point_outside() {
        let kept = ignore_below_x(&pts());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.z.re > 0.0 && p.z.im < 0.0));
        assert_eq!(kept[0].frequency, 1000.0);
        assert_eq!(kept[1].frequency, 10.0);
    }

    #[test]
    fn crop_is_inclusive_and_open_ended() {
        let points = pts();
        let f = |v: Vec<ImpedancePoint>| v.iter().map(|p| p.frequency).collect::<Vec<_>>();
        assert_eq!(f(crop_frequencies(&points, Some(50.0), Some(500.0))), vec![500.0, 100.0, 50.0]);
        assert_eq!(f(crop_frequencies(&points, None, Some(10.0))), vec![10.0, 1.0]);
        assert_eq!(crop_frequencies(&points, None, None).len(), points.len());
    }

    #[test]
    fn sort_orders_frequencies() {
        let mut points = pts();
        sort_by_frequency(&mut points, SortOrder::Ascending);
        assert_eq!(points[0].frequency, 1.0);
        sort_by_frequency(&mut points, SortOrder::Descending);
        assert_eq!(points[0].frequency, 1000.0);
    }

    #[test]
    fn apply_filters_reports_counts() {
        let opts = FilterOptions {
            keep_all: false,
            freq_min: Some(20.0),
            freq_max: None,
            sort: SortOrder::Ascending,
        };
        let (kept, report) = apply_filters(&pts(), &opts).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(
            report,
            FilterReport {
                input: 6,
                removed_quadrant: 4,
                removed_frequency: 1,
                kept: 1
            }
        );
    }

    #[test]
    fn keep_all_skips_quadrant_stage() {
        let opts = FilterOptions {
            keep_all: true,
            freq_min: None,
            freq_max: None,
            sort: SortOrder::None,
        };
        let (kept, report) = apply_filters(&pts(), &opts).unwrap();
        assert_eq!(kept.len(), 6);
        assert_eq!(report.removed_quadrant, 0);
    }

    #[test]
    fn empty_result_and_bad_range_are_errors() {
        let inductive = vec![ImpedancePoint::new(1.0, 1.0, 1.0)];
        let opts = FilterOptions {
            keep_all: false,
            freq_min: None,
            freq_max: None,
            sort: SortOrder::None,
        };
        assert_eq!(apply_filters(&inductive, &opts).unwrap_err().exit_code(), 3);

        let bad = FilterOptions {
            freq_min: Some(10.0),
            freq_max: Some(1.0),
            ..opts
        };
        assert_eq!(apply_filters(&pts(), &bad).unwrap_err().exit_code(), 2);
    }
}
