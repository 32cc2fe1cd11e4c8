//! WindowState - finalized window output
//!
//! The frozen result of a window build: resolved bounds, finalized stations
//! and the accumulated error list. This is the unit persistence serializes;
//! every numeric field must round-trip exactly.

use serde::{Deserialize, Serialize};

use crate::{DataWindowConfig, ErrorRecord, EventOrigin, Station};

/// Finalized, time-bounded, multi-station result of a window query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowState {
    /// The request that produced this window.
    pub config: DataWindowConfig,

    /// Optional location-of-interest annotation.
    #[serde(default)]
    pub origin: Option<EventOrigin>,

    /// Resolved window name (placeholder replaced at finalize).
    pub event_name: String,

    /// Resolved request bounds; `None` only when discovery found nothing.
    pub start_us: Option<f64>,
    pub end_us: Option<f64>,

    /// Finalized stations, in identity-key order.
    pub stations: Vec<Station>,

    /// Window-level error list; station-level errors live on each station.
    pub errors: Vec<ErrorRecord>,
}

impl WindowState {
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Earliest sample instant across all stations.
    pub fn first_timestamp(&self) -> Option<f64> {
        self.stations
            .iter()
            .filter_map(|s| s.first_timestamp())
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.min(t))))
    }

    /// Latest sample instant across all stations.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.stations
            .iter()
            .filter_map(|s| s.last_timestamp())
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }

    /// Total sample count across every sensor of every station.
    pub fn total_samples(&self) -> usize {
        self.stations
            .iter()
            .flat_map(|s| s.sensors.values())
            .map(|s| s.len())
            .sum()
    }
}
