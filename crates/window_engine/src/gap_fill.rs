//! Gap detection and synthetic sample insertion.
//!
//! A gap is a delta between consecutive samples exceeding
//! `max(drop_threshold, 2 * sample_interval)`. Interior synthetic samples
//! are spaced at the nominal interval and never land within one interval of
//! a real endpoint. The same engine fabricates the two window-edge samples
//! during finalize.

use contracts::{ColumnKind, EdgePolicy, SensorSeries, US_PER_S};
use tracing::trace;

/// Tolerance for "sample already sits at the boundary", microseconds.
const EDGE_TOL_US: f64 = 1.0;

/// Gap padding engine for one sensor's series.
#[derive(Debug, Clone, Copy)]
pub struct GapPadEngine {
    /// Nominal sample spacing, seconds.
    pub sample_interval_s: f64,
    /// Minimum gap duration before padding, seconds.
    pub drop_threshold_s: f64,
    pub policy: EdgePolicy,
}

impl GapPadEngine {
    pub fn new(sample_interval_s: f64, drop_threshold_s: f64, policy: EdgePolicy) -> Self {
        Self {
            sample_interval_s,
            drop_threshold_s,
            policy,
        }
    }

    /// Engine for a series' own nominal rate, or None when irregular.
    pub fn for_series(
        series: &SensorSeries,
        drop_threshold_s: f64,
        policy: EdgePolicy,
    ) -> Option<Self> {
        series
            .nominal_interval_us()
            .map(|interval_us| Self::new(interval_us / US_PER_S, drop_threshold_s, policy))
    }

    fn interval_us(&self) -> f64 {
        self.sample_interval_s * US_PER_S
    }

    /// Gap threshold in microseconds.
    pub fn threshold_us(&self) -> f64 {
        self.drop_threshold_s.max(2.0 * self.sample_interval_s) * US_PER_S
    }

    /// Detect gaps and insert synthetic interior samples.
    ///
    /// Returns the number of samples synthesized. The series must already be
    /// sorted and deduplicated; output stays strictly increasing.
    pub fn fill(&self, series: &mut SensorSeries) -> usize {
        let interval = self.interval_us();
        if !interval.is_finite() || interval <= 0.0 {
            return 0;
        }
        let n = series.len();
        if n < 2 {
            return 0;
        }

        let threshold = self.threshold_us();
        let mut inserted = 0usize;

        let mut new_ts: Vec<f64> = Vec::with_capacity(n);
        let mut new_cols: Vec<Vec<f64>> = series.columns.iter().map(|_| Vec::with_capacity(n)).collect();

        for i in 0..n {
            new_ts.push(series.timestamps[i]);
            for (c, column) in series.columns.iter().enumerate() {
                new_cols[c].push(column.values[i]);
            }

            if i + 1 >= n {
                break;
            }
            let left = series.timestamps[i];
            let right = series.timestamps[i + 1];
            let gap = right - left;
            if gap <= threshold {
                continue;
            }

            // Samples strictly inside the gap, at least one interval from
            // each real endpoint.
            let count = ((gap / interval) - 1.0 + 1e-9).floor() as usize;
            for k in 1..=count {
                let t = left + k as f64 * interval;
                if t > right - interval + EDGE_TOL_US {
                    break;
                }
                new_ts.push(t);
                for (c, column) in series.columns.iter().enumerate() {
                    new_cols[c].push(self.synthesize(column.kind, column.values[i], column.values[i + 1], left, right, t));
                }
                inserted += 1;
            }
        }

        if inserted > 0 {
            trace!(
                sensor = %series.sensor,
                inserted,
                threshold_us = threshold,
                "gap padding applied"
            );
            series.timestamps = new_ts;
            for (column, values) in series.columns.iter_mut().zip(new_cols) {
                column.values = values;
            }
        }
        inserted
    }

    /// Value for one synthetic sample between two reals.
    fn synthesize(&self, kind: ColumnKind, left: f64, right: f64, t0: f64, t1: f64, t: f64) -> f64 {
        match self.policy {
            EdgePolicy::Nan => f64::NAN,
            EdgePolicy::Copy => nearest(left, right, t0, t1, t),
            EdgePolicy::Interpolate => match kind {
                ColumnKind::Continuous => {
                    let frac = (t - t0) / (t1 - t0);
                    left + (right - left) * frac
                }
                ColumnKind::Discrete => nearest(left, right, t0, t1, t),
            },
        }
    }

    /// Fabricate one sample at the window's start edge, before all real
    /// samples. No-op when the series already reaches the edge.
    pub fn fabricate_start(&self, series: &mut SensorSeries, at_us: f64) -> bool {
        let Some(first) = series.first_timestamp() else {
            return false;
        };
        if first <= at_us + EDGE_TOL_US {
            return false;
        }

        series.timestamps.insert(0, at_us);
        for column in &mut series.columns {
            let edge = self.edge_value(column.values.first().copied());
            column.values.insert(0, edge);
        }
        true
    }

    /// Fabricate one sample at the window's end edge, after all real
    /// samples. No-op when the series already reaches the edge.
    pub fn fabricate_end(&self, series: &mut SensorSeries, at_us: f64) -> bool {
        let Some(last) = series.last_timestamp() else {
            return false;
        };
        if last >= at_us - EDGE_TOL_US {
            return false;
        }

        series.timestamps.push(at_us);
        for column in &mut series.columns {
            let edge = self.edge_value(column.values.last().copied());
            column.values.push(edge);
        }
        true
    }

    /// Edge fabrication has a single bounding real sample, so Interpolate
    /// degrades to Copy.
    fn edge_value(&self, boundary: Option<f64>) -> f64 {
        match self.policy {
            EdgePolicy::Nan => f64::NAN,
            EdgePolicy::Copy | EdgePolicy::Interpolate => boundary.unwrap_or(f64::NAN),
        }
    }
}

/// Copy of the nearest real sample, split at the gap midpoint.
fn nearest(left: f64, right: f64, t0: f64, t1: f64, t: f64) -> f64 {
    let midpoint = (t0 + t1) / 2.0;
    if t <= midpoint {
        left
    } else {
        right
    }
}
