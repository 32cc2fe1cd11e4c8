//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - Full window builds over the in-memory and directory indexes
//! - Boundary merge, gap interpolation and buffer clamping scenarios
//! - Coverage invariants and persistence round-trips

#[cfg(test)]
mod support {
    use contracts::{
        ApiVersion, RawPacket, SensorChannel, SensorType, StationFingerprint, TimingExchange,
        ValueColumn, US_PER_S,
    };

    pub fn fingerprint() -> StationFingerprint {
        StationFingerprint {
            make: "acme".into(),
            model: "m1".into(),
            os: "android".into(),
            app_version: "3.1".into(),
            is_private: false,
            audio_sample_rate_hz: 100.0,
        }
    }

    /// Audio channel at `rate_hz` covering `[start_us, start_us + seconds)`.
    pub fn audio_channel(start_us: f64, seconds: f64, rate_hz: f64) -> SensorChannel {
        let samples = (seconds * rate_hz) as usize;
        let interval = US_PER_S / rate_hz;
        SensorChannel {
            sensor: SensorType::Audio,
            sample_rate_hz: rate_hz,
            timestamps: (0..samples)
                .map(|i| start_us + i as f64 * interval)
                .collect(),
            columns: vec![ValueColumn::continuous(
                "audio",
                (0..samples).map(|i| (i % 100) as f64 / 100.0).collect(),
            )],
        }
    }

    /// 1 Hz barometer channel covering the same span.
    pub fn barometer_channel(start_us: f64, seconds: f64) -> SensorChannel {
        let samples = seconds as usize;
        SensorChannel {
            sensor: SensorType::Barometer,
            sample_rate_hz: 1.0,
            timestamps: (0..samples)
                .map(|i| start_us + i as f64 * US_PER_S)
                .collect(),
            columns: vec![ValueColumn::continuous(
                "pressure",
                (0..samples).map(|i| 101_325.0 + i as f64).collect(),
            )],
        }
    }

    pub fn exchanges_for(start_us: f64, seconds: f64, offset_us: f64) -> Vec<TimingExchange> {
        (0..5)
            .map(|i| TimingExchange {
                timestamp_us: start_us + i as f64 * seconds * US_PER_S / 4.0,
                latency_us: 10.0,
                offset_us,
            })
            .collect()
    }

    pub fn packet(id: &str, start_us: f64, seconds: f64, channels: Vec<SensorChannel>) -> RawPacket {
        RawPacket {
            station_id: id.into(),
            station_uuid: format!("uuid-{id}"),
            session_start_us: 0.0,
            fingerprint: fingerprint(),
            api: ApiVersion::V1000,
            start_us,
            end_us: start_us + seconds * US_PER_S,
            timing_score: 1.0,
            channels,
            exchanges: vec![],
            source: None,
        }
    }
}

#[cfg(test)]
mod window_build_tests {
    use std::sync::Arc;

    use contracts::{DataWindowConfig, EdgePolicy, US_PER_S};
    use file_index::MemoryIndex;
    use window_engine::DataWindow;

    use crate::support::{audio_channel, barometer_channel, exchanges_for, packet};

    /// Two packets with the same identity key merge into one station with a
    /// clean seam: 100 + 100 strictly increasing samples, no duplicate at
    /// the packet boundary.
    #[tokio::test]
    async fn test_adjacent_packets_merge_without_boundary_duplicate() {
        let index = MemoryIndex::with_packets([
            packet("s1", 0.0, 1.0, vec![audio_channel(0.0, 1.0, 100.0)]),
            packet(
                "s1",
                1.0 * US_PER_S,
                1.0,
                vec![audio_channel(1.0 * US_PER_S, 1.0, 100.0)],
            ),
        ]);

        let config = DataWindowConfig::new("/mem").with_range(0.0, 2.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert_eq!(window.stations().len(), 1);
        let audio = window.stations()[0].audio().unwrap();
        assert_eq!(audio.len(), 200);
        assert!(audio.invariants_hold());
        assert_eq!(audio.first_timestamp(), Some(0.0));
        assert!(audio.last_timestamp().unwrap() < 2.0 * US_PER_S);
    }

    /// A 5-interval audio hole under INTERPOLATE gains exactly 4 evenly
    /// spaced synthetic samples with linearly interpolated values.
    #[tokio::test]
    async fn test_gap_interpolation_inside_window() {
        // 1 Hz barometer with a 5 s hole: samples at 0..=10 s except 6,7,8,9
        let mut channel = barometer_channel(0.0, 11.0);
        let keep: Vec<usize> = (0..11).filter(|i| *i < 6 || *i == 10).collect();
        channel.timestamps = keep.iter().map(|&i| i as f64 * US_PER_S).collect();
        channel.columns[0].values = keep.iter().map(|&i| i as f64).collect();

        let index = MemoryIndex::with_packets([packet(
            "s1",
            0.0,
            11.0,
            vec![audio_channel(0.0, 11.0, 100.0), channel],
        )]);

        let config = DataWindowConfig::new("/mem")
            .with_range(0.0, 11.0 * US_PER_S)
            .with_edge_policy(EdgePolicy::Interpolate);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        let station = &window.stations()[0];
        let baro = station.barometer().unwrap();
        // The 5 s gap between 5 s and 10 s gained samples at 6, 7, 8, 9 s
        let expected: Vec<f64> = (0..11).map(|i| i as f64 * US_PER_S).collect();
        assert_eq!(baro.timestamps[..11], expected[..]);
        for (value, expected) in baro.columns[0].values[..11].iter().zip(0..11) {
            assert!(
                (value - expected as f64).abs() < 1e-9,
                "got {value}, want {expected}"
            );
        }
        // Plus one fabricated sample pinning the series to the audio end
        let audio_last = station.audio().unwrap().last_timestamp().unwrap();
        assert_eq!(baro.last_timestamp(), Some(audio_last));
        assert!(baro.invariants_hold());
    }

    /// Negative buffers clamp to zero and the build still succeeds.
    #[tokio::test]
    async fn test_negative_buffer_clamped() {
        let index = MemoryIndex::with_packets([packet(
            "s1",
            0.0,
            30.0,
            vec![audio_channel(0.0, 30.0, 100.0)],
        )]);

        let config = DataWindowConfig::new("/mem")
            .with_range(5.0 * US_PER_S, 10.0 * US_PER_S)
            .with_buffers(-10.0, -10.0);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert_eq!(window.stations().len(), 1);
        let audio = window.stations()[0].audio().unwrap();
        assert!(audio.first_timestamp().unwrap() >= 5.0 * US_PER_S);
        assert!(audio.last_timestamp().unwrap() < 10.0 * US_PER_S);
    }

    /// Clock correction moves every sensor onto reference time before
    /// trimming, so a 2 s device-clock skew does not shift the window.
    #[tokio::test]
    async fn test_offset_correction_applied_before_trim() {
        let skew_us = 2.0 * US_PER_S;
        let mut p = packet(
            "s1",
            0.0,
            30.0,
            vec![audio_channel(0.0, 30.0, 100.0)],
        );
        // Device clock runs 2 s behind: exchanges say "add 2 s"
        p.exchanges = exchanges_for(0.0, 30.0, skew_us);

        let index = MemoryIndex::with_packets([p]);
        let config = DataWindowConfig::new("/mem")
            .with_range(10.0 * US_PER_S, 20.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        let station = &window.stations()[0];
        assert!((station.offset_model.intercept_us - skew_us).abs() < 1.0);

        let audio = station.audio().unwrap();
        assert!(audio.is_corrected);
        assert!(audio.first_timestamp().unwrap() >= 10.0 * US_PER_S);
        assert!(audio.last_timestamp().unwrap() < 20.0 * US_PER_S);
    }

    /// All sensors end up pinned to the audio series' first and last
    /// instants after finalize.
    #[tokio::test]
    async fn test_sensors_share_window_edges() {
        let index = MemoryIndex::with_packets([packet(
            "s1",
            0.0,
            60.0,
            vec![
                audio_channel(0.0, 60.0, 100.0),
                // Barometer data only exists for the middle of the request
                barometer_channel(20.0 * US_PER_S, 10.0),
            ],
        )]);

        let config = DataWindowConfig::new("/mem")
            .with_range(10.0 * US_PER_S, 50.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        let station = &window.stations()[0];
        let audio = station.audio().unwrap();
        let baro = station.barometer().unwrap();

        assert_eq!(baro.first_timestamp(), audio.first_timestamp());
        assert_eq!(baro.last_timestamp(), audio.last_timestamp());
        assert!(baro.invariants_hold());
    }

    /// Coverage invariant: every retained station either reaches both
    /// requested edges or carries a CoverageUnsatisfied record.
    #[tokio::test]
    async fn test_coverage_invariant() {
        let index = MemoryIndex::with_packets([
            // Covers the request fully
            packet("full", 0.0, 120.0, vec![audio_channel(0.0, 120.0, 100.0)]),
            // Starts late and cannot reach the start edge
            packet(
                "late",
                60.0 * US_PER_S,
                60.0,
                vec![audio_channel(60.0 * US_PER_S, 60.0, 100.0)],
            ),
        ]);

        let start = 10.0 * US_PER_S;
        let end = 100.0 * US_PER_S;
        let config = DataWindowConfig::new("/mem").with_range(start, end);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        for station in window.stations() {
            let audio = station.audio().unwrap();
            let reaches_start = audio.first_timestamp().unwrap() <= start + 2.0;
            let reaches_end = audio.last_timestamp().unwrap() >= end - US_PER_S / 100.0 - 2.0;
            let flagged = window
                .errors()
                .iter()
                .chain(station.errors.iter())
                .any(|e| {
                    e.kind == contracts::ErrorKind::CoverageUnsatisfied
                        && e.station.as_ref() == Some(&station.key)
                });
            assert!(
                (reaches_start && reaches_end) || flagged,
                "station {} violates the coverage invariant",
                station.key
            );
        }
    }

    /// Stations whose data misses the window entirely are dropped but the
    /// build itself succeeds.
    #[tokio::test]
    async fn test_unrelated_station_dropped() {
        let index = MemoryIndex::with_packets([
            packet("s1", 0.0, 60.0, vec![audio_channel(0.0, 60.0, 100.0)]),
            packet(
                "elsewhere",
                10_000.0 * US_PER_S,
                60.0,
                vec![audio_channel(10_000.0 * US_PER_S, 60.0, 100.0)],
            ),
        ]);

        let config = DataWindowConfig::new("/mem").with_range(0.0, 30.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert_eq!(window.stations().len(), 1);
        assert_eq!(window.stations()[0].key.id.as_str(), "s1");
    }

    /// Station id filters restrict both discovery and the final set.
    #[tokio::test]
    async fn test_station_filter() {
        let index = MemoryIndex::with_packets([
            packet("a", 0.0, 10.0, vec![audio_channel(0.0, 10.0, 100.0)]),
            packet("b", 0.0, 10.0, vec![audio_channel(0.0, 10.0, 100.0)]),
        ]);

        let mut config = DataWindowConfig::new("/mem").with_range(0.0, 10.0 * US_PER_S);
        config.station_ids = vec!["b".into()];
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert_eq!(window.stations().len(), 1);
        assert_eq!(window.first_station(None).unwrap().key.id.as_str(), "b");
    }

    /// Corrupt packets are skipped with a Decode record while the rest of
    /// the build proceeds.
    #[tokio::test]
    async fn test_corrupt_packet_recorded_not_fatal() {
        let mut index = MemoryIndex::with_packets([packet(
            "s1",
            0.0,
            10.0,
            vec![audio_channel(0.0, 10.0, 100.0)],
        )]);
        index.push_corrupt("mem/broken", vec![1, 2, 3]);

        let config = DataWindowConfig::new("/mem").with_range(0.0, 10.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert_eq!(window.stations().len(), 1);
        assert!(window
            .errors()
            .iter()
            .any(|e| e.kind == contracts::ErrorKind::Decode));
    }

    /// An empty archive builds an empty window, not an error.
    #[tokio::test]
    async fn test_empty_archive_is_empty_window() {
        let index = MemoryIndex::new();
        let config = DataWindowConfig::new("/mem").with_range(0.0, 10.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert!(window.stations().is_empty());
        assert!(window.event_name().starts_with("dw_"));
        assert!(window
            .errors()
            .iter()
            .any(|e| e.kind == contracts::ErrorKind::EmptyResult));
    }

    /// Audio is the reference sensor; a station without audio is dropped
    /// at finalize with a record.
    #[tokio::test]
    async fn test_station_without_audio_dropped() {
        let index = MemoryIndex::with_packets([packet(
            "baro-only",
            0.0,
            60.0,
            vec![barometer_channel(0.0, 60.0)],
        )]);

        let config = DataWindowConfig::new("/mem").with_range(0.0, 30.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        assert!(window.stations().is_empty());
        assert!(window
            .errors()
            .iter()
            .any(|e| e.kind == contracts::ErrorKind::EmptyStation));
    }

    /// Parallel decode produces the same station set as sequential.
    #[tokio::test]
    async fn test_parallel_workers_deterministic() {
        let packets: Vec<_> = (0..12)
            .map(|i| {
                let id = format!("s{}", i % 4);
                let start = (i / 4) as f64 * 10.0 * US_PER_S;
                packet(&id, start, 10.0, vec![audio_channel(start, 10.0, 100.0)])
            })
            .collect();

        let build = |workers: usize, packets: Vec<contracts::RawPacket>| async move {
            let index = MemoryIndex::with_packets(packets);
            let config = DataWindowConfig::new("/mem")
                .with_range(0.0, 30.0 * US_PER_S)
                .with_workers(workers);
            DataWindow::build(config, None, Arc::new(index)).await.unwrap()
        };

        let sequential = build(1, packets.clone()).await;
        let parallel = build(4, packets).await;

        assert_eq!(sequential.stations().len(), parallel.stations().len());
        for (a, b) in sequential.stations().iter().zip(parallel.stations()) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.sensors.len(), b.sensors.len());
            for (sensor, series) in &a.sensors {
                let other = &b.sensors[sensor];
                assert_eq!(series.timestamps, other.timestamps);
                for (ca, cb) in series.columns.iter().zip(&other.columns) {
                    assert_eq!(ca.values, cb.values);
                }
            }
        }
    }
}

#[cfg(test)]
mod config_tests {
    use std::sync::Arc;

    use contracts::US_PER_S;
    use file_index::MemoryIndex;
    use window_engine::DataWindow;

    use crate::support::{audio_channel, packet};

    /// A window request loaded from TOML drives a full build.
    #[tokio::test]
    async fn test_build_from_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.toml");
        std::fs::write(
            &path,
            r#"
input_dir = "/mem"
event_name = "loaded"
start_us = 0.0
end_us = 20e6
station_ids = ["s1"]
parallel_workers = 2
"#,
        )
        .unwrap();

        let config = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.event_name, "loaded");

        let index = MemoryIndex::with_packets([
            packet("s1", 0.0, 30.0, vec![audio_channel(0.0, 30.0, 100.0)]),
            packet("s2", 0.0, 30.0, vec![audio_channel(0.0, 30.0, 100.0)]),
        ]);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        // Station filter from the file applied; custom name kept
        assert_eq!(window.stations().len(), 1);
        assert_eq!(window.event_name(), "loaded");
        let audio = window.stations()[0].audio().unwrap();
        assert!(audio.last_timestamp().unwrap() < 20.0 * US_PER_S);
    }
}

#[cfg(test)]
mod observability_tests {
    use std::sync::Arc;

    use contracts::{DataWindowConfig, US_PER_S};
    use file_index::MemoryIndex;
    use observability::WindowStatsAggregator;
    use window_engine::DataWindow;

    use crate::support::{audio_channel, packet};

    /// The aggregator folds a real build into a printable summary.
    #[tokio::test]
    async fn test_aggregator_over_real_build() {
        let index = MemoryIndex::with_packets([
            packet("s1", 0.0, 30.0, vec![audio_channel(0.0, 30.0, 100.0)]),
            packet("s2", 0.0, 30.0, vec![audio_channel(0.0, 30.0, 100.0)]),
        ]);
        let config = DataWindowConfig::new("/mem").with_range(0.0, 30.0 * US_PER_S);
        let window = DataWindow::build(config, None, Arc::new(index)).await.unwrap();

        let mut aggregator = WindowStatsAggregator::new();
        aggregator.update(window.state());

        let summary = aggregator.summary();
        assert_eq!(summary.total_windows, 1);
        assert_eq!(summary.total_stations, 2);
        assert_eq!(summary.samples_per_station.count, 2);
        assert!(format!("{summary}").contains("Stations: 2"));
    }
}

#[cfg(test)]
mod persistence_tests {
    use std::sync::Arc;

    use contracts::{DataWindowConfig, US_PER_S};
    use file_index::MemoryIndex;
    use window_engine::{DataWindow, WindowQueryEngine};

    use crate::support::{audio_channel, barometer_channel, exchanges_for, packet};

    async fn built_window() -> DataWindow {
        let mut p = packet(
            "s1",
            0.0,
            60.0,
            vec![
                audio_channel(0.0, 60.0, 100.0),
                barometer_channel(0.0, 60.0),
            ],
        );
        p.exchanges = exchanges_for(0.0, 60.0, 1_500.0);

        let index = MemoryIndex::with_packets([p]);
        let config = DataWindowConfig::new("/mem").with_range(10.0 * US_PER_S, 50.0 * US_PER_S);
        DataWindow::build(config, None, Arc::new(index)).await.unwrap()
    }

    /// Save/load reproduces identity keys, sample counts and bit-identical
    /// arrays.
    #[tokio::test]
    async fn test_window_roundtrip_bit_exact() {
        let window = built_window().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.slw");
        persistence::save_window(&path, window.state()).unwrap();
        let loaded = persistence::load_window(&path).unwrap();

        assert_eq!(loaded.stations.len(), window.stations().len());
        for (a, b) in loaded.stations.iter().zip(window.stations()) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.sensors.len(), b.sensors.len());
            for (sensor, series) in &a.sensors {
                let other = &b.sensors[sensor];
                assert_eq!(series.len(), other.len());
                for (x, y) in series.timestamps.iter().zip(&other.timestamps) {
                    assert_eq!(x.to_bits(), y.to_bits());
                }
                for (ca, cb) in series.columns.iter().zip(&other.columns) {
                    for (x, y) in ca.values.iter().zip(&cb.values) {
                        assert_eq!(x.to_bits(), y.to_bits());
                    }
                }
            }
            assert_eq!(
                a.offset_model.intercept_us.to_bits(),
                b.offset_model.intercept_us.to_bits()
            );
        }
    }

    /// Re-finalizing a loaded window changes nothing.
    #[tokio::test]
    async fn test_refinalize_loaded_window_is_noop() {
        let window = built_window().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.slw");
        persistence::save_window(&path, window.state()).unwrap();
        let mut loaded = persistence::load_window(&path).unwrap();

        let engine = WindowQueryEngine::new(loaded.config.clone());
        engine.finalize(&mut loaded);

        for (a, b) in loaded.stations.iter().zip(window.stations()) {
            for (sensor, series) in &a.sensors {
                assert_eq!(series.timestamps, b.sensors[sensor].timestamps);
            }
        }
        assert_eq!(loaded.event_name, window.event_name());
    }
}

#[cfg(test)]
mod directory_index_tests {
    use std::sync::Arc;

    use contracts::{DataWindowConfig, US_PER_S};
    use file_index::{write_packet, DirectoryIndex};
    use window_engine::DataWindow;

    use crate::support::{audio_channel, packet};

    /// Full stack over a structured on-disk archive with parallel decode.
    #[tokio::test]
    async fn test_build_from_structured_archive() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            let start = i as f64 * 20.0 * US_PER_S;
            let p = packet("s1", start, 20.0, vec![audio_channel(start, 20.0, 100.0)]);
            write_packet(dir.path(), true, &p).unwrap();
        }
        let other = packet("s2", 0.0, 60.0, vec![audio_channel(0.0, 60.0, 100.0)]);
        write_packet(dir.path(), true, &other).unwrap();

        let mut config = DataWindowConfig::new(dir.path())
            .with_range(5.0 * US_PER_S, 55.0 * US_PER_S)
            .with_workers(3);
        config.structured_layout = true;

        let index = Arc::new(DirectoryIndex::new(dir.path(), true));
        let window = DataWindow::build(config, None, index.clone()).await.unwrap();

        assert_eq!(window.stations().len(), 2);
        for station in window.stations() {
            let audio = station.audio().unwrap();
            assert!(audio.invariants_hold());
            assert!(audio.first_timestamp().unwrap() >= 5.0 * US_PER_S);
            assert!(audio.last_timestamp().unwrap() < 55.0 * US_PER_S);
        }
        assert!(index.metrics().snapshot().packets_decoded >= 4);
    }
}
