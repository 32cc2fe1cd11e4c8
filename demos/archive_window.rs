//! On-disk archive demo.
//!
//! Writes a small structured packet archive into a temp directory, builds a
//! window over it with parallel decode, saves the result and loads it back.
//!
//! Run: cargo run --bin archive_window

use std::sync::Arc;

use anyhow::Result;
use contracts::{
    ApiVersion, DataWindowConfig, RawPacket, SensorChannel, SensorType, StationFingerprint,
    ValueColumn, US_PER_S,
};
use file_index::{write_packet, DirectoryIndex};
use tracing::info;
use window_engine::DataWindow;

fn packet(id: &str, start_us: f64, seconds: f64, rate_hz: f64) -> RawPacket {
    let samples = (seconds * rate_hz) as usize;
    let interval = US_PER_S / rate_hz;
    RawPacket {
        station_id: id.into(),
        station_uuid: format!("uuid-{id}"),
        session_start_us: 0.0,
        fingerprint: StationFingerprint {
            make: "acme".into(),
            model: "m1".into(),
            os: "ios".into(),
            app_version: "2.4".into(),
            is_private: true,
            audio_sample_rate_hz: rate_hz,
        },
        api: ApiVersion::V1000,
        start_us,
        end_us: start_us + seconds * US_PER_S,
        timing_score: 1.0,
        channels: vec![SensorChannel {
            sensor: SensorType::Audio,
            sample_rate_hz: rate_hz,
            timestamps: (0..samples)
                .map(|i| start_us + i as f64 * interval)
                .collect(),
            columns: vec![ValueColumn::continuous(
                "audio",
                (0..samples).map(|i| (i as f64 * 0.11).sin()).collect(),
            )],
        }],
        exchanges: vec![],
        source: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_with_config(observability::ObservabilityConfig::compact_console())?;

    let archive = tempfile::tempdir()?;
    for station in ["1637610021", "1637610022", "1637610023"] {
        for i in 0..4 {
            let start = i as f64 * 30.0 * US_PER_S;
            let path = write_packet(archive.path(), true, &packet(station, start, 30.0, 40.0))?;
            info!(path = %path.display(), "packet written");
        }
    }

    let mut config = DataWindowConfig::new(archive.path())
        .with_range(15.0 * US_PER_S, 105.0 * US_PER_S)
        .with_workers(4);
    config.structured_layout = true;
    config.event_name = "archive_demo".into();

    let index = Arc::new(DirectoryIndex::new(archive.path(), true));
    let window = DataWindow::build(config, None, index.clone()).await?;

    println!(
        "built '{}' with {} stations ({} packets decoded)",
        window.event_name(),
        window.stations().len(),
        index.metrics().snapshot().packets_decoded
    );

    let out = archive.path().join("window.slw");
    persistence::save_window(&out, window.state())?;
    let loaded = persistence::load_window(&out)?;
    println!(
        "round trip ok: {} stations, {} samples",
        loaded.station_count(),
        loaded.total_samples()
    );

    Ok(())
}
