//! Index metrics
//!
//! Shared atomic counters for discovery and decode activity, with a
//! snapshot struct for summaries.

use std::sync::atomic::{AtomicU64, Ordering};

/// Index metrics
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Handles returned by listings
    pub candidates_listed: AtomicU64,

    /// Packets decoded successfully
    pub packets_decoded: AtomicU64,

    /// Decode failures
    pub decode_errors: AtomicU64,

    /// Bytes read from storage
    pub bytes_read: AtomicU64,
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_listed(&self, count: usize) {
        self.candidates_listed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_decoded(&self, bytes: usize) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> IndexMetricsSnapshot {
        IndexMetricsSnapshot {
            candidates_listed: self.candidates_listed.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexMetricsSnapshot {
    pub candidates_listed: u64,
    pub packets_decoded: u64,
    pub decode_errors: u64,
    pub bytes_read: u64,
}
