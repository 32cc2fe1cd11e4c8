//! RawPacket - decoded packet contract
//!
//! One decoded unit of multi-sensor data as the packet index hands it to the
//! assembly layer. The wire format itself is the index's concern; the engine
//! only ever sees these structures.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{StationFingerprint, StationId};

/// Sensor kinds a recording station can carry.
///
/// One canonical name per kind; presentation aliases ("microphone" for
/// audio and the like) are a display concern outside this crate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Audio,
    Location,
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Barometer,
    Health,
}

impl SensorType {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Audio => "audio",
            SensorType::Location => "location",
            SensorType::Accelerometer => "accelerometer",
            SensorType::Gyroscope => "gyroscope",
            SensorType::Magnetometer => "magnetometer",
            SensorType::Barometer => "barometer",
            SensorType::Health => "health",
        }
    }

    /// Audio is the reference sensor for window trimming.
    pub fn is_audio(&self) -> bool {
        matches!(self, SensorType::Audio)
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packet wire-format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVersion {
    /// Current packet format.
    V1000,
    /// Legacy packet format, still decodable.
    V900,
}

/// How a value column behaves under interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Continuous physical quantity; linear interpolation is meaningful.
    #[default]
    Continuous,
    /// Enumerated/categorical value (provider codes, flags); interpolation
    /// degrades to copying the nearest real sample.
    Discrete,
}

/// One named value column, parallel to its channel's timestamp array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<f64>,
}

impl ValueColumn {
    pub fn continuous(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Continuous,
            values,
        }
    }

    pub fn discrete(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Discrete,
            values,
        }
    }
}

/// One sensor's samples within a single packet.
///
/// `timestamps` and every column's `values` are index-parallel; the decoder
/// guarantees equal lengths or the packet is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorChannel {
    pub sensor: SensorType,

    /// Nominal sample rate in Hz; NaN for irregular sensors.
    pub sample_rate_hz: f64,

    /// Sample instants, float microseconds since epoch, device clock.
    pub timestamps: Vec<f64>,

    /// Named value columns, all the same length as `timestamps`.
    pub columns: Vec<ValueColumn>,
}

impl SensorChannel {
    /// Columns and timestamps index-parallel and non-ragged.
    pub fn is_well_formed(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.values.len() == self.timestamps.len())
    }
}

/// One timing exchange with the reference clock server.
///
/// `offset_us` is the estimated device-to-reference correction at
/// `timestamp_us`; `latency_us` is the round-trip latency of the exchange
/// and doubles as its trust weight (lower is better).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingExchange {
    pub timestamp_us: f64,
    pub latency_us: f64,
    pub offset_us: f64,
}

/// One decoded packet, as produced by `PacketIndex::decode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPacket {
    /// Station identity fields; see `StationKey`.
    pub station_id: StationId,
    pub station_uuid: String,

    /// Recording-session start on the device clock, microseconds.
    pub session_start_us: f64,

    /// Device metadata fingerprint; a mid-session change splits the station.
    pub fingerprint: StationFingerprint,

    pub api: ApiVersion,

    /// Packet coverage on the device clock, microseconds.
    pub start_us: f64,
    pub end_us: f64,

    /// Per-packet timing quality score in [0,1], as declared by the device.
    pub timing_score: f64,

    pub channels: Vec<SensorChannel>,

    /// Timing exchanges captured during this packet's span.
    pub exchanges: Vec<TimingExchange>,

    /// Undecoded source bytes, retained when the index was asked to keep
    /// provenance. Not interpreted by the engine.
    #[serde(default)]
    pub source: Option<Bytes>,
}

impl RawPacket {
    /// Channel for a sensor type, if the packet carries one.
    pub fn channel(&self, sensor: SensorType) -> Option<&SensorChannel> {
        self.channels.iter().find(|c| c.sensor == sensor)
    }
}
