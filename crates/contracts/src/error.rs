//! Layered error definitions
//!
//! Categorized by source: config / decode / assembly / coverage / io.
//!
//! Only configuration-contract violations are fatal; every other error is
//! accumulated as an `ErrorRecord` on the window or station it belongs to
//! and the build carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StationKey;

/// Which edge of the requested range a coverage failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSide {
    Start,
    End,
}

impl std::fmt::Display for WindowSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowSide::Start => f.write_str("start"),
            WindowSide::End => f.write_str("end"),
        }
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum WindowError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse { message: String },

    /// Configuration validation error; the only fatal kind, raised before
    /// any I/O begins
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Decode Errors =====
    /// A packet could not be parsed; it is skipped and assembly continues
    #[error("packet decode error for '{handle}': {message}")]
    Decode { handle: String, message: String },

    // ===== Assembly Errors =====
    /// Metadata fingerprint mismatch within a claimed station
    #[error("identity conflict for station '{station_id}': {message}")]
    IdentityConflict {
        station_id: String,
        message: String,
    },

    /// Fewer than 3 timing exchanges; the offset model degrades to its
    /// degenerate form
    #[error("insufficient timing data for station '{station_id}': {exchanges} exchange(s), need 3")]
    InsufficientTimingData {
        station_id: String,
        exchanges: usize,
    },

    // ===== Coverage Errors =====
    /// Post-expansion coverage still insufficient on one side
    #[error(
        "coverage unsatisfied for station '{station_id}': {side} edge short by {shortfall_us} us"
    )]
    CoverageUnsatisfied {
        station_id: String,
        side: WindowSide,
        shortfall_us: f64,
    },

    /// A station ended up with no usable data after trimming
    #[error("station '{station_id}' has no usable data after trimming")]
    EmptyStation { station_id: String },

    /// No stations survived assembly and finalize; the window is valid but
    /// empty
    #[error("no stations in the finalized window")]
    EmptyResult,

    // ===== Parallel Assembly Errors =====
    /// A decode worker died; its partial batch is discarded
    #[error("decode worker {worker} failed: {message}")]
    Worker { worker: usize, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl WindowError {
    /// Create a configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
        }
    }

    /// Create a configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a packet decode error
    pub fn decode(handle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            handle: handle.into(),
            message: message.into(),
        }
    }

    /// Create an identity conflict error
    pub fn identity_conflict(
        station_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::IdentityConflict {
            station_id: station_id.into(),
            message: message.into(),
        }
    }

    /// Classify this error for accumulation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WindowError::ConfigParse { .. } | WindowError::ConfigValidation { .. } => {
                ErrorKind::Config
            }
            WindowError::Decode { .. } => ErrorKind::Decode,
            WindowError::IdentityConflict { .. } => ErrorKind::IdentityConflict,
            WindowError::InsufficientTimingData { .. } => ErrorKind::InsufficientTimingData,
            WindowError::CoverageUnsatisfied { .. } => ErrorKind::CoverageUnsatisfied,
            WindowError::EmptyStation { .. } => ErrorKind::EmptyStation,
            WindowError::EmptyResult => ErrorKind::EmptyResult,
            WindowError::Worker { .. } => ErrorKind::Worker,
            WindowError::Io(_) => ErrorKind::Io,
            WindowError::Other(_) => ErrorKind::Other,
        }
    }

    /// Fatal errors abort the build before any I/O; everything else is
    /// recorded and skipped over.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Config)
    }
}

/// Serializable error classification, stored in error lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Decode,
    IdentityConflict,
    InsufficientTimingData,
    CoverageUnsatisfied,
    EmptyStation,
    EmptyResult,
    Worker,
    Io,
    Other,
}

/// One accumulated, non-fatal error.
///
/// Stations and windows carry lists of these; they survive serialization so
/// a loaded window still reports what went wrong during its build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Station the error is attached to, if any; `None` for window-level
    /// errors.
    pub station: Option<StationKey>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    /// Record an error against a station.
    pub fn for_station(key: StationKey, err: &WindowError) -> Self {
        Self {
            station: Some(key),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Record a window-level error.
    pub fn window_level(err: &WindowError) -> Self {
        Self {
            station: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
