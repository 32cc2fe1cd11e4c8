//! In-memory window build demo.
//!
//! Generates synthetic packets for two stations (one with a clock skew and
//! a mid-session audio hole), builds a window over them and prints the
//! result.
//!
//! Run: cargo run --bin memory_window

use std::sync::Arc;

use anyhow::Result;
use contracts::{
    ApiVersion, DataWindowConfig, EdgePolicy, RawPacket, SensorChannel, SensorType,
    StationFingerprint, TimingExchange, ValueColumn, US_PER_S,
};
use file_index::MemoryIndex;
use observability::WindowStatsAggregator;
use tracing::info;
use window_engine::DataWindow;

fn fingerprint(model: &str) -> StationFingerprint {
    StationFingerprint {
        make: "acme".into(),
        model: model.into(),
        os: "android".into(),
        app_version: "3.1.0".into(),
        is_private: false,
        audio_sample_rate_hz: 80.0,
    }
}

fn audio(start_us: f64, seconds: f64, rate_hz: f64) -> SensorChannel {
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
            (0..samples)
                .map(|i| (i as f64 * 0.2).sin())
                .collect(),
        )],
    }
}

fn barometer(start_us: f64, seconds: f64) -> SensorChannel {
    let samples = seconds as usize;
    SensorChannel {
        sensor: SensorType::Barometer,
        sample_rate_hz: 1.0,
        timestamps: (0..samples)
            .map(|i| start_us + i as f64 * US_PER_S)
            .collect(),
        columns: vec![ValueColumn::continuous(
            "pressure",
            (0..samples)
                .map(|i| 101_325.0 + (i as f64 * 0.05).cos() * 40.0)
                .collect(),
        )],
    }
}

fn exchanges(start_us: f64, seconds: f64, offset_us: f64) -> Vec<TimingExchange> {
    (0..8)
        .map(|i| TimingExchange {
            timestamp_us: start_us + i as f64 * seconds * US_PER_S / 7.0,
            latency_us: 40.0 + (i % 3) as f64 * 25.0,
            offset_us,
        })
        .collect()
}

fn packet(
    id: &str,
    model: &str,
    start_us: f64,
    seconds: f64,
    channels: Vec<SensorChannel>,
    offset_us: f64,
) -> RawPacket {
    RawPacket {
        station_id: id.into(),
        station_uuid: format!("uuid-{id}"),
        session_start_us: 0.0,
        fingerprint: fingerprint(model),
        api: ApiVersion::V1000,
        start_us,
        end_us: start_us + seconds * US_PER_S,
        timing_score: 0.9,
        channels,
        exchanges: exchanges(start_us, seconds, offset_us),
        source: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_with_config(observability::ObservabilityConfig::compact_console())?;

    // Station "steady": continuous coverage, no skew
    let mut packets: Vec<RawPacket> = (0..6)
        .map(|i| {
            let start = i as f64 * 20.0 * US_PER_S;
            packet(
                "steady",
                "m1",
                start,
                20.0,
                vec![audio(start, 20.0, 80.0), barometer(start, 20.0)],
                0.0,
            )
        })
        .collect();

    // Station "skewed": 1.2 s clock skew and a 15 s audio hole
    for (start_s, seconds) in [(0.0, 45.0), (60.0, 60.0)] {
        let start = start_s * US_PER_S;
        packets.push(packet(
            "skewed",
            "m2",
            start,
            seconds,
            vec![audio(start, seconds, 80.0)],
            1.2 * US_PER_S,
        ));
    }

    let index = Arc::new(MemoryIndex::with_packets(packets));

    let config = DataWindowConfig::new("/demo/mem")
        .with_range(10.0 * US_PER_S, 100.0 * US_PER_S)
        .with_edge_policy(EdgePolicy::Interpolate);

    let window = DataWindow::build(config, None, index).await?;
    info!(event = window.event_name(), "window built");

    for station in window.stations() {
        println!("\nstation {}", station.key);
        println!(
            "  offset model: intercept {:.1} us, slope {:.3e}, score {:.3}",
            station.offset_model.intercept_us,
            station.offset_model.slope,
            station.offset_model.score
        );
        for (sensor, series) in &station.sensors {
            println!(
                "  {sensor}: {} samples over [{:.2}, {:.2}] s",
                series.len(),
                series.first_timestamp().unwrap_or(0.0) / US_PER_S,
                series.last_timestamp().unwrap_or(0.0) / US_PER_S,
            );
        }
        for error in &station.errors {
            println!("  error: {}", error.message);
        }
    }

    let mut aggregator = WindowStatsAggregator::new();
    aggregator.update(window.state());
    println!("\n{}", aggregator.summary());

    Ok(())
}
