//! Station - assembled per-device output state
//!
//! A `Station` is one physical device's continuous recording session after
//! assembly: packet metadata, one `SensorSeries` per sensor type, the fitted
//! `OffsetModel` and the errors collected along the way. All numeric fields
//! round-trip exactly through serde.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{ErrorRecord, SensorType, StationId, ValueColumn};

/// Station identity key.
///
/// Two packets belong to the same station iff id, uuid, session start AND
/// the metadata fingerprint all match exactly. The timestamp participates in
/// equality bit-for-bit so the key can live in hash maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationKey {
    pub id: StationId,
    pub uuid: String,
    /// Session start on the device clock, float microseconds since epoch.
    pub session_start_us: f64,
}

impl PartialEq for StationKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.uuid == other.uuid
            && self.session_start_us.to_bits() == other.session_start_us.to_bits()
    }
}

impl Eq for StationKey {}

impl Hash for StationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.uuid.hash(state);
        self.session_start_us.to_bits().hash(state);
    }
}

impl std::fmt::Display for StationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}@{}", self.id, self.uuid, self.session_start_us)
    }
}

/// Device metadata fingerprint.
///
/// A change in any field mid-session produces a new station even when the
/// identity key is unchanged (device reconfiguration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationFingerprint {
    pub make: String,
    pub model: String,
    pub os: String,
    pub app_version: String,
    pub is_private: bool,
    /// Declared audio sample rate in Hz; compared bit-for-bit.
    pub audio_sample_rate_hz: f64,
}

impl PartialEq for StationFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.make == other.make
            && self.model == other.model
            && self.os == other.os
            && self.app_version == other.app_version
            && self.is_private == other.is_private
            && self.audio_sample_rate_hz.to_bits() == other.audio_sample_rate_hz.to_bits()
    }
}

impl Eq for StationFingerprint {}

impl Hash for StationFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.make.hash(state);
        self.model.hash(state);
        self.os.hash(state);
        self.app_version.hash(state);
        self.is_private.hash(state);
        self.audio_sample_rate_hz.to_bits().hash(state);
    }
}

/// Per-packet metadata retained on the assembled station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketMetadata {
    pub start_us: f64,
    pub end_us: f64,
    /// Timing quality score in [0,1] as declared by the device.
    pub timing_score: f64,
}

/// Fitted clock-offset model state.
///
/// `offset(t) = slope * (t - start_time_us) + intercept_us`; correcting a
/// timestamp adds that offset. The fitter lives in the engine crate; this is
/// the frozen result it produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetModel {
    /// Offset drift per microsecond of elapsed time.
    pub slope: f64,
    /// Offset at `start_time_us`, microseconds.
    pub intercept_us: f64,
    /// Reference instant of the fit.
    pub start_time_us: f64,
    /// Coefficient of determination of the fit, in [0,1]; 0 for degenerate
    /// models.
    pub score: f64,
    pub mean_latency_us: f64,
    pub stddev_latency_us: f64,
    /// Usable exchanges the fit consumed.
    pub exchange_count: usize,
}

impl OffsetModel {
    /// Model that corrects nothing; used when no exchange data exists.
    pub fn empty() -> Self {
        Self {
            slope: 0.0,
            intercept_us: 0.0,
            start_time_us: 0.0,
            score: 0.0,
            mean_latency_us: 0.0,
            stddev_latency_us: 0.0,
            exchange_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exchange_count == 0
    }

    /// Modeled offset at a given instant.
    pub fn offset_at(&self, timestamp_us: f64) -> f64 {
        self.slope * (timestamp_us - self.start_time_us) + self.intercept_us
    }

    /// Correct a device timestamp to reference time.
    ///
    /// With `use_model` the full linear model applies; without it the
    /// constant best-offset (`intercept_us`) is added instead.
    pub fn correct_timestamp(&self, timestamp_us: f64, use_model: bool) -> f64 {
        if use_model {
            timestamp_us + self.offset_at(timestamp_us)
        } else {
            timestamp_us + self.intercept_us
        }
    }
}

impl Default for OffsetModel {
    fn default() -> Self {
        Self::empty()
    }
}

/// One sensor's ordered time series within a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSeries {
    pub sensor: SensorType,

    /// Nominal sample rate in Hz; NaN when the sensor is irregular.
    pub sample_rate_hz: f64,

    /// Strictly increasing after assembly, float microseconds since epoch.
    pub timestamps: Vec<f64>,

    /// Value columns, each the same length as `timestamps`.
    pub columns: Vec<ValueColumn>,

    /// Whether timestamps have been corrected to reference time.
    pub is_corrected: bool,
}

impl SensorSeries {
    pub fn new(sensor: SensorType, sample_rate_hz: f64) -> Self {
        Self {
            sensor,
            sample_rate_hz,
            timestamps: Vec::new(),
            columns: Vec::new(),
            is_corrected: false,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Nominal sample spacing in microseconds, if the rate is regular.
    pub fn nominal_interval_us(&self) -> Option<f64> {
        if self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0 {
            Some(crate::US_PER_S / self.sample_rate_hz)
        } else {
            None
        }
    }

    pub fn column(&self, name: &str) -> Option<&ValueColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Post-assembly invariant: strictly increasing timestamps and
    /// non-ragged columns.
    pub fn invariants_hold(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] < w[1])
            && self
                .columns
                .iter()
                .all(|c| c.values.len() == self.timestamps.len())
    }
}

/// One physical device's assembled recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub key: StationKey,
    pub fingerprint: StationFingerprint,

    /// Per-packet metadata, in packet start order.
    pub packets: Vec<PacketMetadata>,

    /// One series per sensor type; a station never holds two series of the
    /// same type.
    pub sensors: BTreeMap<SensorType, SensorSeries>,

    pub offset_model: OffsetModel,

    /// Assembly and coverage errors attached to this station.
    pub errors: Vec<ErrorRecord>,
}

impl Station {
    pub fn new(key: StationKey, fingerprint: StationFingerprint) -> Self {
        Self {
            key,
            fingerprint,
            packets: Vec::new(),
            sensors: BTreeMap::new(),
            offset_model: OffsetModel::empty(),
            errors: Vec::new(),
        }
    }

    pub fn sensor(&self, sensor: SensorType) -> Option<&SensorSeries> {
        self.sensors.get(&sensor)
    }

    pub fn audio(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Audio)
    }

    pub fn location(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Location)
    }

    pub fn accelerometer(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Accelerometer)
    }

    pub fn gyroscope(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Gyroscope)
    }

    pub fn magnetometer(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Magnetometer)
    }

    pub fn barometer(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Barometer)
    }

    pub fn health(&self) -> Option<&SensorSeries> {
        self.sensor(SensorType::Health)
    }

    /// Earliest sample instant across all sensors.
    pub fn first_timestamp(&self) -> Option<f64> {
        self.sensors
            .values()
            .filter_map(|s| s.first_timestamp())
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.min(t))))
    }

    /// Latest sample instant across all sensors.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.sensors
            .values()
            .filter_map(|s| s.last_timestamp())
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }

    /// True when no sensor holds any samples.
    pub fn is_data_empty(&self) -> bool {
        self.sensors.values().all(|s| s.is_empty())
    }

    pub fn record_error(&mut self, err: &crate::WindowError) {
        self.errors
            .push(ErrorRecord::for_station(self.key.clone(), err));
    }
}
