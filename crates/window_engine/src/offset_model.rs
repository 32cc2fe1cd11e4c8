//! Clock-offset model fitting.
//!
//! Fits a linear offset-vs-time model from discrete timing exchanges.
//! Exchanges are partitioned into bins balanced over the full time span;
//! within each bin the lowest-latency exchange wins, since low round-trip
//! latency implies a trustworthy offset estimate. The line is solved over
//! the bin representatives via 2x2 normal equations.

use std::cmp::Ordering;

use contracts::{OffsetModel, TimingExchange};
use nalgebra::{Matrix2, Vector2};
use tracing::debug;

/// Samples per bin when selecting representatives.
pub const BIN_SAMPLES: usize = 3;

/// Minimum usable exchanges for a real linear fit.
pub const MIN_FIT_EXCHANGES: usize = 3;

/// Residual floor below which a fit counts as exact.
const EXACT_FIT_TOL: f64 = 1e-6;

/// Fit an offset model with the default bin width.
pub fn fit_offset_model(exchanges: &[TimingExchange]) -> OffsetModel {
    fit_offset_model_binned(exchanges, BIN_SAMPLES)
}

/// Fit an offset model with an explicit bin width.
///
/// Never fails: zero usable exchanges produce the empty model and fewer
/// than [`MIN_FIT_EXCHANGES`] produce the degenerate constant-offset model.
pub fn fit_offset_model_binned(exchanges: &[TimingExchange], bin_samples: usize) -> OffsetModel {
    let mut usable: Vec<TimingExchange> = exchanges
        .iter()
        .copied()
        .filter(|e| {
            e.latency_us.is_finite() && e.timestamp_us.is_finite() && e.offset_us.is_finite()
        })
        .collect();

    if usable.is_empty() {
        return OffsetModel::empty();
    }

    usable.sort_by(|a, b| a.timestamp_us.total_cmp(&b.timestamp_us));

    let (mean_latency, stddev_latency) = latency_stats(&usable);
    let start_time_us = usable[0].timestamp_us;
    let best_offset = lowest_latency_offset(&usable);

    if usable.len() < MIN_FIT_EXCHANGES {
        return OffsetModel {
            slope: 0.0,
            intercept_us: best_offset,
            start_time_us,
            score: 0.0,
            mean_latency_us: mean_latency,
            stddev_latency_us: stddev_latency,
            exchange_count: usable.len(),
        };
    }

    let reps = bin_representatives(&usable, bin_samples.max(1));
    match solve_line(&reps, start_time_us) {
        Some((slope, intercept_us, score)) => {
            debug!(
                exchanges = usable.len(),
                bins = reps.len(),
                slope,
                intercept_us,
                score,
                "offset model fitted"
            );
            OffsetModel {
                slope,
                intercept_us,
                start_time_us,
                score,
                mean_latency_us: mean_latency,
                stddev_latency_us: stddev_latency,
                exchange_count: usable.len(),
            }
        }
        // Singular system (all representatives at one instant): keep the
        // constant best-offset instead of guessing a slope.
        None => OffsetModel {
            slope: 0.0,
            intercept_us: best_offset,
            start_time_us,
            score: 0.0,
            mean_latency_us: mean_latency,
            stddev_latency_us: stddev_latency,
            exchange_count: usable.len(),
        },
    }
}

/// Offset of the lowest-latency exchange; the single most trustworthy
/// estimate available.
fn lowest_latency_offset(usable: &[TimingExchange]) -> f64 {
    usable
        .iter()
        .min_by(|a, b| {
            a.latency_us
                .partial_cmp(&b.latency_us)
                .unwrap_or(Ordering::Equal)
        })
        .map(|e| e.offset_us)
        .unwrap_or(0.0)
}

fn latency_stats(usable: &[TimingExchange]) -> (f64, f64) {
    let n = usable.len() as f64;
    let mean = usable.iter().map(|e| e.latency_us).sum::<f64>() / n;
    if usable.len() < 2 {
        return (mean, 0.0);
    }
    let var = usable
        .iter()
        .map(|e| (e.latency_us - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    (mean, var.sqrt())
}

/// Partition time-sorted exchanges into bins balanced across the span and
/// pick the lowest-latency exchange from each.
///
/// Bin count aims for `bin_samples` exchanges per bin but never drops below
/// [`MIN_FIT_EXCHANGES`] bins, so a minimal 3-exchange input still yields
/// three fit points.
fn bin_representatives(sorted: &[TimingExchange], bin_samples: usize) -> Vec<TimingExchange> {
    let k = (sorted.len() / bin_samples).clamp(MIN_FIT_EXCHANGES, sorted.len());

    let mut reps = Vec::with_capacity(k);
    for bin in 0..k {
        let lo = bin * sorted.len() / k;
        let hi = ((bin + 1) * sorted.len() / k).max(lo + 1);
        if let Some(best) = sorted[lo..hi].iter().min_by(|a, b| {
            a.latency_us
                .partial_cmp(&b.latency_us)
                .unwrap_or(Ordering::Equal)
        }) {
            reps.push(*best);
        }
    }
    reps
}

/// Least squares y = slope*x + intercept over (timestamp - start, offset)
/// pairs; returns (slope, intercept, r_squared) or None when singular.
fn solve_line(reps: &[TimingExchange], start_time_us: f64) -> Option<(f64, f64, f64)> {
    let n = reps.len() as f64;
    let xs: Vec<f64> = reps.iter().map(|e| e.timestamp_us - start_time_us).collect();
    let ys: Vec<f64> = reps.iter().map(|e| e.offset_us).collect();

    let sx: f64 = xs.iter().sum();
    let sxx: f64 = xs.iter().map(|x| x * x).sum();
    let sy: f64 = ys.iter().sum();
    let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| x * y).sum();

    let normal = Matrix2::new(n, sx, sx, sxx);
    let rhs = Vector2::new(sy, sxy);
    let solution = normal.lu().solve(&rhs)?;
    let (intercept, slope) = (solution[0], solution[1]);
    if !slope.is_finite() || !intercept.is_finite() {
        return None;
    }

    let y_mean = sy / n;
    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();

    // Constant-offset input has zero total variance; an exact fit of it is
    // still a perfect fit.
    let score = if ss_tot <= EXACT_FIT_TOL {
        if ss_res <= EXACT_FIT_TOL {
            1.0
        } else {
            0.0
        }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some((slope, intercept, score))
}
