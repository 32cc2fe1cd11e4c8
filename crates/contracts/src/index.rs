//! PacketIndex trait - packet discovery and decode collaborator
//!
//! The engine never touches the wire format or the directory layout; it asks
//! an index for candidate handles in a time range and then for decoded
//! packets. Implementations live outside this crate (directory archives,
//! in-memory fixtures).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{ApiVersion, RawPacket, StationId, WindowError};

/// Half-open query range in float microseconds; either bound may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_us: Option<f64>,
    pub end_us: Option<f64>,
}

impl TimeRange {
    pub fn new(start_us: f64, end_us: f64) -> Self {
        Self {
            start_us: Some(start_us),
            end_us: Some(end_us),
        }
    }

    /// Unbounded range; matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether a packet spanning [start, end] could contribute samples to
    /// this range. Unset bounds never exclude.
    pub fn overlaps(&self, packet_start_us: f64, packet_end_us: f64) -> bool {
        if let Some(end) = self.end_us {
            if packet_start_us > end {
                return false;
            }
        }
        if let Some(start) = self.start_us {
            if packet_end_us < start {
                return false;
            }
        }
        true
    }
}

/// Discovery filters, all conjunctive. Empty vectors mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub range: TimeRange,
    pub station_ids: Vec<StationId>,
    pub extensions: Vec<String>,
    pub api_versions: Vec<ApiVersion>,
}

impl CandidateFilter {
    pub fn for_range(range: TimeRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    pub fn matches_station(&self, id: &StationId) -> bool {
        self.station_ids.is_empty() || self.station_ids.iter().any(|s| s == id)
    }

    pub fn matches_api(&self, api: ApiVersion) -> bool {
        self.api_versions.is_empty() || self.api_versions.contains(&api)
    }

    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.is_empty() || self.extensions.iter().any(|e| e == ext)
    }
}

/// Lightweight reference to one undecoded packet.
///
/// Carries whatever timing the index could read cheaply (file name, header)
/// so the engine can prune before paying for a full decode. `payload` is set
/// when the index already holds the encoded bytes in memory.
#[derive(Debug, Clone)]
pub struct PacketHandle {
    /// Index-scoped identity (file path or fixture key); also the handle's
    /// name in decode errors.
    pub id: String,

    pub api: ApiVersion,

    /// Station the handle claims to belong to, when the layout encodes it.
    pub station_hint: Option<StationId>,

    /// Packet span hints from cheap header/filename inspection; decode is
    /// authoritative.
    pub start_hint_us: Option<f64>,
    pub end_hint_us: Option<f64>,

    /// Encoded packet bytes, when the index keeps them in memory.
    pub payload: Option<Bytes>,
}

/// Packet discovery + decode, the engine's only I/O dependency.
///
/// Implementations must be safe to share across decode workers; `decode` is
/// called from blocking tasks in the parallel path.
pub trait PacketIndex: Send + Sync {
    /// All candidate handles matching the filter. Over-approximation is
    /// allowed (hints may be missing); under-approximation is not.
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<PacketHandle>, WindowError>;

    /// Decode one handle into a packet.
    fn decode(&self, handle: &PacketHandle) -> Result<RawPacket, WindowError>;
}
