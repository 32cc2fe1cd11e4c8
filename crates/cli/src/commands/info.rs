//! `info` command implementation.
//!
//! Summarizes a saved window file without rebuilding anything.

use anyhow::{Context, Result};
use contracts::WindowState;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

#[derive(Serialize)]
struct WindowInfo {
    path: String,
    event_name: String,
    start_us: Option<f64>,
    end_us: Option<f64>,
    station_count: usize,
    total_samples: usize,
    window_errors: usize,
    stations: Vec<StationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

#[derive(Serialize)]
struct StationInfo {
    id: String,
    uuid: String,
    session_start_us: f64,
    packets: usize,
    model_score: f64,
    station_errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensors: Option<Vec<SensorInfo>>,
}

#[derive(Serialize)]
struct SensorInfo {
    sensor: String,
    samples: usize,
    sample_rate_hz: f64,
    corrected: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(window = %args.window.display(), "Reading window file");

    let state = persistence::load_window(&args.window)
        .with_context(|| format!("failed to load window from {}", args.window.display()))?;

    let report = build_info(args, &state);

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialize window info")?;
        println!("{}", json);
    } else {
        print_info(&report);
    }
    Ok(())
}

fn build_info(args: &InfoArgs, state: &WindowState) -> WindowInfo {
    WindowInfo {
        path: args.window.display().to_string(),
        event_name: state.event_name.clone(),
        start_us: state.start_us,
        end_us: state.end_us,
        station_count: state.station_count(),
        total_samples: state.total_samples(),
        window_errors: state.errors.len(),
        stations: state
            .stations
            .iter()
            .map(|station| StationInfo {
                id: station.key.id.to_string(),
                uuid: station.key.uuid.clone(),
                session_start_us: station.key.session_start_us,
                packets: station.packets.len(),
                model_score: station.offset_model.score,
                station_errors: station.errors.len(),
                sensors: args.sensors.then(|| {
                    station
                        .sensors
                        .values()
                        .map(|series| SensorInfo {
                            sensor: series.sensor.to_string(),
                            samples: series.len(),
                            sample_rate_hz: series.sample_rate_hz,
                            corrected: series.is_corrected,
                        })
                        .collect()
                }),
            })
            .collect(),
        errors: args.errors.then(|| {
            state
                .errors
                .iter()
                .chain(state.stations.iter().flat_map(|s| s.errors.iter()))
                .map(|record| format!("[{:?}] {}", record.kind, record.message))
                .collect()
        }),
    }
}

fn print_info(report: &WindowInfo) {
    println!("Window file: {}", report.path);
    println!("  Event: {}", report.event_name);
    if let (Some(start), Some(end)) = (report.start_us, report.end_us) {
        println!(
            "  Range: [{start}, {end}) us ({:.1} s)",
            (end - start) / 1e6
        );
    }
    println!("  Stations: {}", report.station_count);
    println!("  Total samples: {}", report.total_samples);
    if report.window_errors > 0 {
        println!("  Window-level errors: {}", report.window_errors);
    }

    for station in &report.stations {
        println!(
            "\n  Station {} ({}) session start {} us",
            station.id, station.uuid, station.session_start_us
        );
        println!(
            "    packets: {}, model score: {:.3}, errors: {}",
            station.packets, station.model_score, station.station_errors
        );
        if let Some(ref sensors) = station.sensors {
            for sensor in sensors {
                println!(
                    "    {}: {} samples @ {} Hz{}",
                    sensor.sensor,
                    sensor.samples,
                    sensor.sample_rate_hz,
                    if sensor.corrected { " (corrected)" } else { "" }
                );
            }
        }
    }

    if let Some(ref errors) = report.errors {
        if !errors.is_empty() {
            println!("\n  Errors:");
            for error in errors {
                println!("    - {}", error);
            }
        }
    }
}
