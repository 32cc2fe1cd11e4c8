//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-crate data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are float microseconds since the Unix epoch (f64)
//! - Durations in configuration are seconds; conversion to microseconds
//!   happens at the engine boundary

mod config;
mod error;
mod index;
mod sensor;
mod station;
mod station_id;
mod window;

pub use config::*;
pub use error::*;
pub use index::*;
pub use sensor::*;
pub use station::*;
pub use station_id::StationId;
pub use window::WindowState;

/// Microseconds per second, the conversion used everywhere a config
/// duration meets a timestamp.
pub const US_PER_S: f64 = 1_000_000.0;
