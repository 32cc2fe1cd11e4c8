//! # Window Engine
//!
//! Core data-aggregation engine: turns a packet archive plus a
//! `DataWindowConfig` into a finalized, gap-filled, time-aligned set of
//! `Station`s.
//!
//! Responsibilities:
//! - Clock-offset model fitting from timing exchanges
//! - Packet grouping into per-station, per-sensor series
//! - Gap detection and synthetic sample insertion
//! - Two-phase query expansion until coverage is satisfied
//! - Finalize pass: correction, trimming, edge fabrication
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use contracts::DataWindowConfig;
//! use window_engine::DataWindow;
//!
//! let config = DataWindowConfig::new("/data/archive")
//!     .with_range(start_us, end_us);
//!
//! let window = DataWindow::build(config, None, Arc::new(index)).await?;
//! for station in window.stations() {
//!     // Inspect per-sensor series
//! }
//! ```

mod assembler;
mod engine;
mod facade;
mod gap_fill;
mod offset_model;
mod ring;
mod series;

pub use assembler::{AssemblerConfig, StationAssembler};
pub use engine::WindowQueryEngine;
pub use facade::DataWindow;
pub use gap_fill::GapPadEngine;
pub use offset_model::{fit_offset_model, fit_offset_model_binned};
pub use ring::{ExchangeBuffer, ExchangeLog, EXCHANGE_HISTORY};

// Re-export contracts types the public API surfaces
pub use contracts::{
    DataWindowConfig, EdgePolicy, OffsetModel, SensorSeries, SensorType, Station, WindowState,
};
