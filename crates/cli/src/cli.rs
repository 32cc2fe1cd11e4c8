//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// stationloader - multi-station sensor data window builder
#[derive(Parser, Debug)]
#[command(
    name = "stationloader",
    author,
    version,
    about = "Builds time-aligned multi-station sensor data windows",
    long_about = "Reads a packet archive, reconciles device clocks against timing \n\
                  exchanges, assembles per-station sensor series, fills gaps and \n\
                  trims everything to a requested time range."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STATIONLOADER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STATIONLOADER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a window from a config file
    Run(RunArgs),

    /// Validate a config file without building
    Validate(ValidateArgs),

    /// Display information about a saved window file
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "window.toml", env = "STATIONLOADER_CONFIG")]
    pub config: PathBuf,

    /// Override the packet archive root from configuration
    #[arg(long, env = "STATIONLOADER_INPUT")]
    pub input: Option<PathBuf>,

    /// Override the requested window start (microseconds since epoch)
    #[arg(long)]
    pub start_us: Option<f64>,

    /// Override the requested window end (microseconds since epoch)
    #[arg(long)]
    pub end_us: Option<f64>,

    /// Override the decode worker count
    #[arg(long, env = "STATIONLOADER_WORKERS")]
    pub workers: Option<usize>,

    /// Save the finalized window to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Validate configuration and exit without building
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "STATIONLOADER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "window.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to a saved window file
    #[arg(short, long)]
    pub window: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show per-sensor sample counts
    #[arg(long)]
    pub sensors: bool,

    /// Show recorded errors
    #[arg(long)]
    pub errors: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
