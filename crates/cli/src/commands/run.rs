//! `run` command implementation.
//!
//! Loads the config, builds the window against a directory index and prints
//! a build summary; optionally persists the finalized window.

use std::sync::Arc;

use anyhow::{Context, Result};
use file_index::DirectoryIndex;
use observability::WindowStatsAggregator;
use tracing::info;
use window_engine::DataWindow;

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_window(args: &RunArgs) -> Result<()> {
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    // CLI overrides win over file values
    if let Some(input) = &args.input {
        config.input_dir = input.clone();
    }
    if let Some(start_us) = args.start_us {
        config.start_us = Some(start_us);
    }
    if let Some(end_us) = args.end_us {
        config.end_us = Some(end_us);
    }
    if let Some(workers) = args.workers {
        config.parallel_workers = workers;
    }

    if args.dry_run {
        println!("✓ Configuration is valid: {}", args.config.display());
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        input = %config.input_dir.display(),
        workers = config.parallel_workers,
        "building window"
    );

    let index = Arc::new(DirectoryIndex::new(
        config.input_dir.clone(),
        config.structured_layout,
    ));
    let index_metrics = index.metrics();

    let window = DataWindow::build(config, None, index)
        .await
        .context("window build failed")?;

    observability::record_window_built(window.state());

    let mut aggregator = WindowStatsAggregator::new();
    aggregator.update(window.state());
    print_build_report(&window, &aggregator);

    let decode_snapshot = index_metrics.snapshot();
    info!(
        listed = decode_snapshot.candidates_listed,
        decoded = decode_snapshot.packets_decoded,
        decode_errors = decode_snapshot.decode_errors,
        "index activity"
    );

    if let Some(output) = &args.output {
        persistence::save_window(output, window.state())
            .with_context(|| format!("failed to save window to {}", output.display()))?;
        println!("Window saved to {}", output.display());
    }

    Ok(())
}

fn print_build_report(window: &DataWindow, aggregator: &WindowStatsAggregator) {
    println!("Window '{}' built", window.event_name());
    if let (Some(start), Some(end)) = (window.start_us(), window.end_us()) {
        println!(
            "  Range: [{start}, {end}) us ({:.1} s)",
            (end - start) / 1e6
        );
    }
    println!("  Stations: {}", window.stations().len());
    for station in window.stations() {
        let samples: usize = station.sensors.values().map(|s| s.len()).sum();
        println!(
            "    {} ({} sensors, {} samples, model score {:.3})",
            station.key,
            station.sensors.len(),
            samples,
            station.offset_model.score
        );
    }
    if !window.errors().is_empty() {
        println!("  Window-level errors: {}", window.errors().len());
    }
    println!();
    print!("{}", aggregator.summary());
}
