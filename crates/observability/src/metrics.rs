//! Window build metrics.
//!
//! Records per-build and per-station metrics through the `metrics` facade
//! and aggregates them in memory so the CLI can print a build summary.

use contracts::{ErrorKind, SensorType, Station, WindowState};
use metrics::{counter, gauge, histogram};

/// Record metrics for one finalized window.
///
/// Call once per completed build.
pub fn record_window_built(state: &WindowState) {
    counter!("stationloader_windows_total").increment(1);
    gauge!("stationloader_last_window_stations").set(state.station_count() as f64);
    histogram!("stationloader_window_samples").record(state.total_samples() as f64);

    let error_count = state.errors.len()
        + state
            .stations
            .iter()
            .map(|s| s.errors.len())
            .sum::<usize>();
    if error_count > 0 {
        counter!("stationloader_window_errors_total").increment(error_count as u64);
    }

    if let (Some(start), Some(end)) = (state.start_us, state.end_us) {
        histogram!("stationloader_window_span_s").record((end - start) / 1e6);
    }

    for station in &state.stations {
        record_station_assembled(station);
    }
}

/// Record metrics for one finalized station.
pub fn record_station_assembled(station: &Station) {
    counter!(
        "stationloader_stations_total",
        "station_id" => station.key.id.to_string()
    )
    .increment(1);

    gauge!(
        "stationloader_offset_model_score",
        "station_id" => station.key.id.to_string()
    )
    .set(station.offset_model.score);

    histogram!("stationloader_offset_intercept_us").record(station.offset_model.intercept_us.abs());
    histogram!("stationloader_mean_exchange_latency_us").record(station.offset_model.mean_latency_us);

    for (sensor, series) in &station.sensors {
        gauge!(
            "stationloader_sensor_samples",
            "station_id" => station.key.id.to_string(),
            "sensor" => sensor.as_str()
        )
        .set(series.len() as f64);
    }
}

/// Window build aggregator
///
/// Aggregates build statistics in memory for summary output.
#[derive(Debug, Clone, Default)]
pub struct WindowStatsAggregator {
    /// Windows observed
    pub total_windows: u64,

    /// Stations across all windows
    pub total_stations: u64,

    /// Accumulated error counts by kind
    pub error_counts: std::collections::HashMap<ErrorKind, u64>,

    /// Per-station sample counts
    pub sample_stats: RunningStats,

    /// Offset model quality scores
    pub score_stats: RunningStats,

    /// Mean exchange latency per station (microseconds)
    pub latency_stats: RunningStats,

    /// Audio samples per station
    pub audio_sample_stats: RunningStats,
}

impl WindowStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finalized window into the aggregate.
    pub fn update(&mut self, state: &WindowState) {
        self.total_windows += 1;
        self.total_stations += state.station_count() as u64;

        for record in state
            .errors
            .iter()
            .chain(state.stations.iter().flat_map(|s| s.errors.iter()))
        {
            *self.error_counts.entry(record.kind).or_insert(0) += 1;
        }

        for station in &state.stations {
            let samples: usize = station.sensors.values().map(|s| s.len()).sum();
            self.sample_stats.push(samples as f64);
            self.score_stats.push(station.offset_model.score);
            self.latency_stats.push(station.offset_model.mean_latency_us);
            if let Some(audio) = station.sensor(SensorType::Audio) {
                self.audio_sample_stats.push(audio.len() as f64);
            }
        }
    }

    /// Produce a summary report.
    pub fn summary(&self) -> WindowBuildSummary {
        WindowBuildSummary {
            total_windows: self.total_windows,
            total_stations: self.total_stations,
            total_errors: self.error_counts.values().sum(),
            samples_per_station: StatsSummary::from(&self.sample_stats),
            model_scores: StatsSummary::from(&self.score_stats),
            exchange_latency_us: StatsSummary::from(&self.latency_stats),
            error_counts: self
                .error_counts
                .iter()
                .map(|(k, v)| (format!("{k:?}"), *v))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Build summary
#[derive(Debug, Clone, Default)]
pub struct WindowBuildSummary {
    pub total_windows: u64,
    pub total_stations: u64,
    pub total_errors: u64,
    pub samples_per_station: StatsSummary,
    pub model_scores: StatsSummary,
    pub exchange_latency_us: StatsSummary,
    pub error_counts: std::collections::HashMap<String, u64>,
}

impl std::fmt::Display for WindowBuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Window Build Summary ===")?;
        writeln!(f, "Windows: {}", self.total_windows)?;
        writeln!(f, "Stations: {}", self.total_stations)?;
        writeln!(f, "Errors: {}", self.total_errors)?;
        writeln!(f, "Samples per station: {}", self.samples_per_station)?;
        writeln!(f, "Offset model scores: {}", self.model_scores)?;
        writeln!(f, "Exchange latency (us): {}", self.exchange_latency_us)?;

        if !self.error_counts.is_empty() {
            writeln!(f, "Error kinds:")?;
            let mut kinds: Vec<_> = self.error_counts.iter().collect();
            kinds.sort_by(|a, b| a.0.cmp(b.0));
            for (kind, count) in kinds {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

/// Statistic summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Fold in a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
