//! In-memory packet index.
//!
//! Fixture index for tests and demos: packets are encoded into bytes at
//! insertion and decoded through the same codec the directory index uses,
//! so fixtures exercise the full decode path without touching disk.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{CandidateFilter, PacketHandle, PacketIndex, RawPacket, WindowError};
use tracing::debug;

use crate::metrics::IndexMetrics;

struct MemoryEntry {
    key: String,
    api: contracts::ApiVersion,
    station_id: contracts::StationId,
    start_us: f64,
    end_us: f64,
    encoded: Bytes,
}

/// In-memory `PacketIndex` over pre-built packets.
pub struct MemoryIndex {
    entries: Vec<MemoryEntry>,
    metrics: Arc<IndexMetrics>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            metrics: Arc::new(IndexMetrics::new()),
        }
    }

    /// Index over a fixed packet set.
    pub fn with_packets(packets: impl IntoIterator<Item = RawPacket>) -> Self {
        let mut index = Self::new();
        for packet in packets {
            index.push(packet);
        }
        index
    }

    /// Encode and register one packet.
    pub fn push(&mut self, packet: RawPacket) {
        let key = format!("mem/{}_{}", packet.station_id, packet.start_us);
        let encoded = match bincode::serialize(&packet) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                // Fixture construction bug, not a runtime condition
                debug!(key = %key, error = %err, "packet failed to encode, skipped");
                return;
            }
        };
        self.entries.push(MemoryEntry {
            key,
            api: packet.api,
            station_id: packet.station_id.clone(),
            start_us: packet.start_us,
            end_us: packet.end_us,
            encoded,
        });
    }

    /// Register raw bytes under a key, for decode-failure fixtures.
    pub fn push_corrupt(&mut self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.entries.push(MemoryEntry {
            key: key.into(),
            api: contracts::ApiVersion::V1000,
            station_id: "corrupt".into(),
            start_us: f64::MIN,
            end_us: f64::MAX,
            encoded: bytes.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> Arc<IndexMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIndex for MemoryIndex {
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<PacketHandle>, WindowError> {
        let handles: Vec<PacketHandle> = self
            .entries
            .iter()
            .filter(|e| filter.range.overlaps(e.start_us, e.end_us))
            .filter(|e| filter.matches_station(&e.station_id))
            .filter(|e| filter.matches_api(e.api))
            .map(|e| PacketHandle {
                id: e.key.clone(),
                api: e.api,
                station_hint: Some(e.station_id.clone()),
                start_hint_us: Some(e.start_us),
                end_hint_us: Some(e.end_us),
                payload: Some(e.encoded.clone()),
            })
            .collect();

        self.metrics.record_listed(handles.len());
        Ok(handles)
    }

    fn decode(&self, handle: &PacketHandle) -> Result<RawPacket, WindowError> {
        let bytes = handle
            .payload
            .as_ref()
            .ok_or_else(|| WindowError::decode(&handle.id, "handle carries no payload"))?;

        match bincode::deserialize::<RawPacket>(bytes) {
            Ok(packet) => {
                self.metrics.record_decoded(bytes.len());
                Ok(packet)
            }
            Err(err) => {
                self.metrics.record_decode_error();
                Err(WindowError::decode(&handle.id, err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ApiVersion, SensorChannel, SensorType, StationFingerprint, TimeRange, ValueColumn,
    };

    fn packet(id: &str, start_us: f64, end_us: f64) -> RawPacket {
        RawPacket {
            station_id: id.into(),
            station_uuid: "u".into(),
            session_start_us: 0.0,
            fingerprint: StationFingerprint {
                make: "acme".into(),
                model: "m1".into(),
                os: "android".into(),
                app_version: "1.0".into(),
                is_private: false,
                audio_sample_rate_hz: 10.0,
            },
            api: ApiVersion::V1000,
            start_us,
            end_us,
            timing_score: 1.0,
            channels: vec![SensorChannel {
                sensor: SensorType::Audio,
                sample_rate_hz: 10.0,
                timestamps: vec![start_us],
                columns: vec![ValueColumn::continuous("audio", vec![0.5])],
            }],
            exchanges: vec![],
            source: None,
        }
    }

    #[test]
    fn test_roundtrip_through_codec() {
        let index = MemoryIndex::with_packets([packet("a", 0.0, 100.0)]);
        let handles = index
            .list_candidates(&CandidateFilter::default())
            .unwrap();
        assert_eq!(handles.len(), 1);

        let decoded = index.decode(&handles[0]).unwrap();
        assert_eq!(decoded.station_id, "a");
        assert_eq!(decoded.channels[0].columns[0].values, vec![0.5]);
    }

    #[test]
    fn test_range_filtering() {
        let index = MemoryIndex::with_packets([
            packet("a", 0.0, 100.0),
            packet("a", 200.0, 300.0),
        ]);

        let filter = CandidateFilter::for_range(TimeRange::new(150.0, 250.0));
        let handles = index.list_candidates(&filter).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].start_hint_us, Some(200.0));
    }

    #[test]
    fn test_station_filtering() {
        let index = MemoryIndex::with_packets([
            packet("a", 0.0, 100.0),
            packet("b", 0.0, 100.0),
        ]);

        let filter = CandidateFilter {
            station_ids: vec!["b".into()],
            ..Default::default()
        };
        let handles = index.list_candidates(&filter).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].station_hint, Some("b".into()));
    }

    #[test]
    fn test_corrupt_entry_reports_decode_error() {
        let mut index = MemoryIndex::new();
        index.push_corrupt("mem/bad", vec![0xde, 0xad, 0xbe, 0xef]);

        let handles = index
            .list_candidates(&CandidateFilter::default())
            .unwrap();
        let err = index.decode(&handles[0]).unwrap_err();
        assert_eq!(err.kind(), contracts::ErrorKind::Decode);
        assert_eq!(index.metrics().snapshot().decode_errors, 1);
    }
}
