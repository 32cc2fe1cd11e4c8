//! DataWindowConfig - immutable window request descriptor
//!
//! Created once by the caller (or the config loader), consumed by the query
//! engine. Never mutated after construction; the engine clamps and resolves
//! into its own working state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ApiVersion, StationId};

/// Default start/end query buffer, seconds.
pub const DEFAULT_BUFFER_S: f64 = 120.0;

/// Default minimum gap duration before padding kicks in, seconds.
pub const DEFAULT_GAP_THRESHOLD_S: f64 = 0.25;

/// Placeholder event name; replaced by `dw_<start_date>_<n>` at finalize.
pub const DEFAULT_EVENT_NAME: &str = "dw";

/// Value synthesis rule for gap padding and window-edge fabrication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// Synthetic samples carry NaN in every column.
    Nan,
    /// Copy the nearest real sample's values (midpoint split inside gaps).
    #[default]
    Copy,
    /// Linear interpolation per column; discrete columns fall back to Copy.
    Interpolate,
}

/// Static location-of-interest descriptor. Purely descriptive; the engine
/// never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub provider: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub latitude_std: f64,
    pub longitude_std: f64,
    pub altitude_std: f64,
    pub radius_m: f64,
}

/// Immutable window build request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataWindowConfig {
    /// Root of the packet archive to read.
    pub input_dir: PathBuf,

    /// Whether the archive uses the per-station directory layout
    /// (`<root>/<station_id>/...`) rather than a flat directory.
    #[serde(default)]
    pub structured_layout: bool,

    /// Window name; the placeholder default is replaced at finalize time.
    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Requested half-open range [start, end), float microseconds since
    /// epoch. Unset bounds are resolved from discovered data.
    #[serde(default)]
    pub start_us: Option<f64>,
    #[serde(default)]
    pub end_us: Option<f64>,

    /// Query buffers, seconds. Negative values clamp to zero.
    #[serde(default = "default_buffer_s")]
    pub start_buffer_s: f64,
    #[serde(default = "default_buffer_s")]
    pub end_buffer_s: f64,

    /// Station id filter; empty means all stations.
    #[serde(default)]
    pub station_ids: Vec<StationId>,

    /// File extension filter; empty means index defaults.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Packet format filter; empty means all formats.
    #[serde(default)]
    pub api_versions: Vec<ApiVersion>,

    /// Apply clock-offset correction to sensor timestamps.
    #[serde(default = "default_true")]
    pub apply_correction: bool,

    /// Use the full linear model; false means constant best-offset.
    #[serde(default = "default_true")]
    pub use_offset_model: bool,

    /// Value synthesis rule for gaps and window edges.
    #[serde(default)]
    pub edge_policy: EdgePolicy,

    /// Minimum gap duration before padding, seconds.
    #[serde(default = "default_gap_threshold_s")]
    pub gap_threshold_s: f64,

    /// Decode worker count; values above 1 enable the parallel decode path.
    /// Explicit here rather than ambient so behavior stays deterministic.
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,

    /// Retry count for remote fetches performed by the index.
    #[serde(default = "default_retries")]
    pub fetch_retries: u32,
}

fn default_event_name() -> String {
    DEFAULT_EVENT_NAME.to_string()
}

fn default_buffer_s() -> f64 {
    DEFAULT_BUFFER_S
}

fn default_gap_threshold_s() -> f64 {
    DEFAULT_GAP_THRESHOLD_S
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_retries() -> u32 {
    1
}

impl DataWindowConfig {
    /// Config with defaults for everything except the archive root.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            structured_layout: false,
            event_name: default_event_name(),
            start_us: None,
            end_us: None,
            start_buffer_s: DEFAULT_BUFFER_S,
            end_buffer_s: DEFAULT_BUFFER_S,
            station_ids: Vec::new(),
            extensions: Vec::new(),
            api_versions: Vec::new(),
            apply_correction: true,
            use_offset_model: true,
            edge_policy: EdgePolicy::default(),
            gap_threshold_s: DEFAULT_GAP_THRESHOLD_S,
            parallel_workers: 1,
            fetch_retries: 1,
        }
    }

    /// Builder-style range setter, used heavily by tests and demos.
    pub fn with_range(mut self, start_us: f64, end_us: f64) -> Self {
        self.start_us = Some(start_us);
        self.end_us = Some(end_us);
        self
    }

    pub fn with_buffers(mut self, start_s: f64, end_s: f64) -> Self {
        self.start_buffer_s = start_s;
        self.end_buffer_s = end_s;
        self
    }

    pub fn with_edge_policy(mut self, policy: EdgePolicy) -> Self {
        self.edge_policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers;
        self
    }

    /// Whether the caller left the event name at its placeholder.
    pub fn has_placeholder_name(&self) -> bool {
        self.event_name == DEFAULT_EVENT_NAME || self.event_name.is_empty()
    }
}
