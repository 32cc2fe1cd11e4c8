//! Station assembly from raw packets.
//!
//! Groups decoded packets by identity key + metadata fingerprint, merges
//! their per-sensor channels into ordered series, fits the clock-offset
//! model from the group's timing exchanges and gap-fills each regular
//! series. Assembly never aborts the batch: malformed pieces are recorded
//! on the station they belong to and skipped.

use std::collections::HashMap;

use contracts::{
    DataWindowConfig, EdgePolicy, PacketMetadata, RawPacket, SensorSeries, Station,
    StationFingerprint, StationKey, WindowError,
};
use slab::Slab;
use tracing::{debug, instrument};

use crate::gap_fill::GapPadEngine;
use crate::offset_model::{fit_offset_model, MIN_FIT_EXCHANGES};
use crate::ring::ExchangeLog;
use crate::series;

/// The subset of the window config assembly cares about.
#[derive(Debug, Clone, Copy)]
pub struct AssemblerConfig {
    pub apply_correction: bool,
    pub use_offset_model: bool,
    pub edge_policy: EdgePolicy,
    pub gap_threshold_s: f64,
}

impl From<&DataWindowConfig> for AssemblerConfig {
    fn from(config: &DataWindowConfig) -> Self {
        Self {
            apply_correction: config.apply_correction,
            use_offset_model: config.use_offset_model,
            edge_policy: config.edge_policy,
            gap_threshold_s: config.gap_threshold_s,
        }
    }
}

/// One station being accumulated before sealing.
struct StationDraft {
    key: StationKey,
    fingerprint: StationFingerprint,
    packets: Vec<PacketMetadata>,
    sensors: std::collections::BTreeMap<contracts::SensorType, SensorSeries>,
    exchanges: ExchangeLog,
    errors: Vec<WindowError>,
}

impl StationDraft {
    fn new(key: StationKey, fingerprint: StationFingerprint) -> Self {
        Self {
            key,
            fingerprint,
            packets: Vec::new(),
            sensors: std::collections::BTreeMap::new(),
            exchanges: ExchangeLog::default(),
            errors: Vec::new(),
        }
    }
}

/// Groups raw packets into sealed stations.
pub struct StationAssembler {
    config: AssemblerConfig,
}

impl StationAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Assemble a packet batch into stations, in identity-key order.
    ///
    /// Packets need not arrive sorted; they are ordered by packet start
    /// before concatenation, so the result is independent of discovery
    /// order.
    #[instrument(name = "assembler_assemble", skip(self, packets), fields(packets = packets.len()))]
    pub fn assemble(&self, mut packets: Vec<RawPacket>) -> Vec<Station> {
        packets.sort_by(|a, b| {
            a.start_us
                .total_cmp(&b.start_us)
                .then_with(|| a.station_id.as_str().cmp(b.station_id.as_str()))
        });

        let mut drafts: Slab<StationDraft> = Slab::new();
        let mut by_identity: HashMap<(StationKey, StationFingerprint), usize> = HashMap::new();

        for packet in packets {
            let key = StationKey {
                id: packet.station_id.clone(),
                uuid: packet.station_uuid.clone(),
                session_start_us: packet.session_start_us,
            };
            let identity = (key.clone(), packet.fingerprint.clone());
            let slot = *by_identity.entry(identity).or_insert_with(|| {
                drafts.insert(StationDraft::new(key, packet.fingerprint.clone()))
            });
            self.append_packet(&mut drafts[slot], packet);
        }

        let mut stations: Vec<Station> = drafts.drain().map(|d| self.seal(d)).collect();
        stations.sort_by(|a, b| {
            a.key
                .id
                .as_str()
                .cmp(b.key.id.as_str())
                .then_with(|| a.key.uuid.cmp(&b.key.uuid))
                .then_with(|| a.key.session_start_us.total_cmp(&b.key.session_start_us))
        });

        let packet_total: u64 = stations.iter().map(|s| s.packets.len() as u64).sum();
        metrics::counter!("window_packets_assembled_total").increment(packet_total);
        debug!(stations = stations.len(), "assembly complete");
        stations
    }

    fn append_packet(&self, draft: &mut StationDraft, packet: RawPacket) {
        draft.packets.push(PacketMetadata {
            start_us: packet.start_us,
            end_us: packet.end_us,
            timing_score: packet.timing_score,
        });
        draft.exchanges.extend(packet.exchanges.iter().copied());

        for channel in &packet.channels {
            let series = draft
                .sensors
                .entry(channel.sensor)
                .or_insert_with(|| SensorSeries::new(channel.sensor, channel.sample_rate_hz));

            // A changed rate declaration inside one identity rejects the
            // offending channel; the rest of the packet still counts.
            if rate_conflicts(series.sample_rate_hz, channel.sample_rate_hz) {
                draft.errors.push(WindowError::identity_conflict(
                    draft.key.id.as_str(),
                    format!(
                        "{} sample rate changed from {} to {} Hz mid-session; samples rejected",
                        channel.sensor, series.sample_rate_hz, channel.sample_rate_hz
                    ),
                ));
                continue;
            }

            if let Err(err) = series::append_channel(series, channel) {
                draft.errors.push(WindowError::identity_conflict(
                    draft.key.id.as_str(),
                    err.to_string(),
                ));
            }
        }
    }

    /// Order, correct and gap-fill every series, fit the offset model and
    /// freeze the draft into a station.
    fn seal(&self, draft: StationDraft) -> Station {
        let mut station = Station::new(draft.key, draft.fingerprint);
        station.packets = draft.packets;
        station.sensors = draft.sensors;

        for err in &draft.errors {
            station.record_error(err);
        }

        let exchanges = draft.exchanges.to_ordered_sequence();
        station.offset_model = fit_offset_model(&exchanges);
        if station.offset_model.exchange_count > 0
            && station.offset_model.exchange_count < MIN_FIT_EXCHANGES
        {
            let err = WindowError::InsufficientTimingData {
                station_id: station.key.id.to_string(),
                exchanges: station.offset_model.exchange_count,
            };
            station.record_error(&err);
        }

        let mut padded = 0usize;
        for series in station.sensors.values_mut() {
            series::sort_dedup(series);
            if self.config.apply_correction {
                series::apply_offset(series, &station.offset_model, self.config.use_offset_model);
            }
            if let Some(engine) =
                GapPadEngine::for_series(series, self.config.gap_threshold_s, self.config.edge_policy)
            {
                padded += engine.fill(series);
            }
        }

        metrics::counter!("window_stations_assembled_total").increment(1);
        if padded > 0 {
            metrics::counter!("window_gap_samples_synthesized_total").increment(padded as u64);
        }
        station
    }
}

fn rate_conflicts(current_hz: f64, incoming_hz: f64) -> bool {
    // NaN means irregular; irregular never conflicts with irregular
    match (current_hz.is_finite(), incoming_hz.is_finite()) {
        (true, true) => current_hz.to_bits() != incoming_hz.to_bits(),
        (false, false) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ApiVersion, ErrorKind, SensorChannel, SensorType, TimingExchange, ValueColumn};

    fn fingerprint() -> StationFingerprint {
        StationFingerprint {
            make: "acme".into(),
            model: "m1".into(),
            os: "android".into(),
            app_version: "3.1".into(),
            is_private: false,
            audio_sample_rate_hz: 100.0,
        }
    }

    fn audio_channel(start_us: f64, samples: usize, rate_hz: f64) -> SensorChannel {
        let interval = 1_000_000.0 / rate_hz;
        let timestamps: Vec<f64> = (0..samples).map(|i| start_us + i as f64 * interval).collect();
        let values: Vec<f64> = (0..samples).map(|i| (i % 7) as f64).collect();
        SensorChannel {
            sensor: SensorType::Audio,
            sample_rate_hz: rate_hz,
            timestamps,
            columns: vec![ValueColumn::continuous("audio", values)],
        }
    }

    fn packet(id: &str, start_us: f64, end_us: f64, channels: Vec<SensorChannel>) -> RawPacket {
        RawPacket {
            station_id: id.into(),
            station_uuid: "uuid-1".into(),
            session_start_us: 0.0,
            fingerprint: fingerprint(),
            api: ApiVersion::V1000,
            start_us,
            end_us,
            timing_score: 1.0,
            channels,
            exchanges: vec![],
            source: None,
        }
    }

    fn assembler() -> StationAssembler {
        StationAssembler::new(AssemblerConfig {
            apply_correction: true,
            use_offset_model: true,
            edge_policy: EdgePolicy::Copy,
            gap_threshold_s: 0.25,
        })
    }

    #[test]
    fn test_two_packets_one_station() {
        // Packet A covers [0, 1s) at 100 Hz, packet B [1s, 2s)
        let packets = vec![
            packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 100, 100.0)]),
            packet(
                "s1",
                1_000_000.0,
                2_000_000.0,
                vec![audio_channel(1_000_000.0, 100, 100.0)],
            ),
        ];

        let stations = assembler().assemble(packets);
        assert_eq!(stations.len(), 1);

        let audio = stations[0].audio().unwrap();
        assert_eq!(audio.len(), 200);
        assert!(audio.invariants_hold());
        assert_eq!(audio.first_timestamp(), Some(0.0));
        assert_eq!(audio.last_timestamp(), Some(1_990_000.0));
        assert_eq!(stations[0].packets.len(), 2);
    }

    #[test]
    fn test_unsorted_packets_are_ordered_by_start() {
        let packets = vec![
            packet(
                "s1",
                1_000_000.0,
                2_000_000.0,
                vec![audio_channel(1_000_000.0, 10, 10.0)],
            ),
            packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]),
        ];

        let stations = assembler().assemble(packets);
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].packets[0].start_us, 0.0);
        assert!(stations[0].audio().unwrap().invariants_hold());
    }

    #[test]
    fn test_fingerprint_change_splits_station() {
        let mut reconfigured = packet(
            "s1",
            1_000_000.0,
            2_000_000.0,
            vec![audio_channel(1_000_000.0, 10, 10.0)],
        );
        reconfigured.fingerprint.app_version = "3.2".into();

        let packets = vec![
            packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]),
            reconfigured,
        ];

        let stations = assembler().assemble(packets);
        assert_eq!(stations.len(), 2);
    }

    #[test]
    fn test_rate_conflict_rejects_channel_and_records() {
        let mut bad = packet(
            "s1",
            1_000_000.0,
            2_000_000.0,
            vec![SensorChannel {
                sensor: SensorType::Barometer,
                sample_rate_hz: 2.0,
                timestamps: vec![1_000_000.0],
                columns: vec![ValueColumn::continuous("pressure", vec![101.0])],
            }],
        );
        bad.channels.push(audio_channel(1_000_000.0, 10, 10.0));

        let good = packet(
            "s1",
            0.0,
            1_000_000.0,
            vec![
                SensorChannel {
                    sensor: SensorType::Barometer,
                    sample_rate_hz: 1.0,
                    timestamps: vec![0.0],
                    columns: vec![ValueColumn::continuous("pressure", vec![100.0])],
                },
                audio_channel(0.0, 10, 10.0),
            ],
        );

        let stations = assembler().assemble(vec![good, bad]);
        assert_eq!(stations.len(), 1);

        let station = &stations[0];
        // Barometer kept only the first packet's sample
        assert_eq!(station.barometer().unwrap().len(), 1);
        // Audio unaffected
        assert_eq!(station.audio().unwrap().len(), 20);
        assert!(station
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::IdentityConflict));
    }

    #[test]
    fn test_offset_model_fitted_and_applied() {
        let mut p = packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]);
        p.exchanges = vec![
            TimingExchange {
                timestamp_us: 0.0,
                latency_us: 0.0,
                offset_us: 500.0,
            },
            TimingExchange {
                timestamp_us: 500_000.0,
                latency_us: 0.0,
                offset_us: 500.0,
            },
            TimingExchange {
                timestamp_us: 1_000_000.0,
                latency_us: 0.0,
                offset_us: 500.0,
            },
        ];

        let stations = assembler().assemble(vec![p]);
        let station = &stations[0];
        assert!((station.offset_model.intercept_us - 500.0).abs() < 1e-6);

        let audio = station.audio().unwrap();
        assert!(audio.is_corrected);
        assert_eq!(audio.first_timestamp(), Some(500.0));
    }

    #[test]
    fn test_too_few_exchanges_degrades_and_records() {
        let mut p = packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]);
        p.exchanges = vec![TimingExchange {
            timestamp_us: 0.0,
            latency_us: 10.0,
            offset_us: 250.0,
        }];

        let stations = assembler().assemble(vec![p]);
        let station = &stations[0];
        assert_eq!(station.offset_model.slope, 0.0);
        assert_eq!(station.offset_model.intercept_us, 250.0);
        assert!(station
            .errors
            .iter()
            .any(|e| e.kind == ErrorKind::InsufficientTimingData));
    }

    #[test]
    fn test_no_exchanges_is_not_an_error() {
        let p = packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]);
        let stations = assembler().assemble(vec![p]);
        assert!(stations[0].offset_model.is_empty());
        assert!(stations[0].errors.is_empty());
    }

    #[test]
    fn test_gap_between_packets_is_padded() {
        // 10 Hz audio with a 3 s hole between packets
        let packets = vec![
            packet("s1", 0.0, 1_000_000.0, vec![audio_channel(0.0, 10, 10.0)]),
            packet(
                "s1",
                4_000_000.0,
                5_000_000.0,
                vec![audio_channel(4_000_000.0, 10, 10.0)],
            ),
        ];

        let stations = assembler().assemble(packets);
        let audio = stations[0].audio().unwrap();

        // Gap from 0.9 s to 4.0 s padded at 0.1 s spacing
        assert!(audio.len() > 20);
        assert!(audio.invariants_hold());
        let max_delta = audio
            .timestamps
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0_f64, f64::max);
        assert!(max_delta <= 2.0 * 100_000.0 + 1.0);
    }
}
