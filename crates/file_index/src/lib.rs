//! # File Index
//!
//! `PacketIndex` implementations: packet discovery and decode behind the
//! collaborator trait the window engine consumes.
//!
//! - [`MemoryIndex`] - in-memory fixture index for tests and demos
//! - [`DirectoryIndex`] - bincode packet files under a root directory,
//!   flat or per-station structured layout
//!
//! The engine never sees paths or bytes; it only sees handles and decoded
//! packets.

mod dir;
mod mem;
mod metrics;

pub use dir::{packet_file_name, write_packet, DirectoryIndex, PACKET_EXTENSION};
pub use mem::MemoryIndex;
pub use metrics::{IndexMetrics, IndexMetricsSnapshot};

// Re-export the trait side of the contract for convenience
pub use contracts::{CandidateFilter, PacketHandle, PacketIndex, TimeRange};
