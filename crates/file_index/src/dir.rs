//! Directory-backed packet index.
//!
//! Packets live as bincode files named
//! `<station_id>_<start_us>_<end_us>.rpkt`, either directly under the root
//! (flat layout) or under one subdirectory per station (structured layout).
//! Listing prunes on the timing encoded in file names; decode is
//! authoritative.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{
    ApiVersion, CandidateFilter, PacketHandle, PacketIndex, RawPacket, StationId, WindowError,
};
use tracing::{debug, trace, warn};

use crate::metrics::IndexMetrics;

/// Extension for current-format packet files.
pub const PACKET_EXTENSION: &str = "rpkt";

/// Extension for legacy-format packet files.
pub const LEGACY_EXTENSION: &str = "rpkt9";

/// `PacketIndex` over a packet-file directory tree.
pub struct DirectoryIndex {
    root: PathBuf,
    structured: bool,
    metrics: Arc<IndexMetrics>,
}

impl DirectoryIndex {
    pub fn new(root: impl Into<PathBuf>, structured: bool) -> Self {
        Self {
            root: root.into(),
            structured,
            metrics: Arc::new(IndexMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IndexMetrics> {
        Arc::clone(&self.metrics)
    }

    fn scan_dirs(&self, filter: &CandidateFilter) -> Result<Vec<PathBuf>, WindowError> {
        if !self.structured {
            return Ok(vec![self.root.clone()]);
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Structured layout: directory name is the station id
            if filter.matches_station(&StationId::new(name)) {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn handle_for(path: &Path, filter: &CandidateFilter) -> Option<PacketHandle> {
        let ext = path.extension()?.to_str()?;
        let api = api_from_extension(ext)?;
        if !filter.matches_extension(ext) || !filter.matches_api(api) {
            return None;
        }

        let stem = path.file_stem()?.to_str()?;
        let parsed = parse_file_stem(stem);

        if let Some((ref station_id, start_us, end_us)) = parsed {
            if !filter.matches_station(station_id) {
                return None;
            }
            if !filter.range.overlaps(start_us, end_us) {
                return None;
            }
        }
        // Unparseable names survive listing with no hints; decode decides

        Some(PacketHandle {
            id: path.display().to_string(),
            api,
            station_hint: parsed.as_ref().map(|(id, _, _)| id.clone()),
            start_hint_us: parsed.as_ref().map(|&(_, s, _)| s),
            end_hint_us: parsed.as_ref().map(|&(_, _, e)| e),
            payload: None,
        })
    }
}

impl PacketIndex for DirectoryIndex {
    fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<PacketHandle>, WindowError> {
        let mut handles = Vec::new();
        for dir in self.scan_dirs(filter)? {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "directory unreadable, skipped");
                    continue;
                }
            };
            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if let Some(handle) = Self::handle_for(&entry.path(), filter) {
                    handles.push(handle);
                }
            }
        }

        // Stable listing order regardless of filesystem iteration order
        handles.sort_by(|a, b| a.id.cmp(&b.id));
        self.metrics.record_listed(handles.len());
        metrics::counter!("index_candidates_listed_total").increment(handles.len() as u64);
        debug!(root = %self.root.display(), handles = handles.len(), "candidates listed");
        Ok(handles)
    }

    fn decode(&self, handle: &PacketHandle) -> Result<RawPacket, WindowError> {
        let bytes = match &handle.payload {
            Some(bytes) => bytes.to_vec(),
            None => std::fs::read(&handle.id).map_err(|err| {
                self.metrics.record_decode_error();
                WindowError::decode(&handle.id, err.to_string())
            })?,
        };

        match bincode::deserialize::<RawPacket>(&bytes) {
            Ok(packet) => {
                trace!(handle = %handle.id, bytes = bytes.len(), "packet decoded");
                self.metrics.record_decoded(bytes.len());
                metrics::counter!("index_bytes_read_total").increment(bytes.len() as u64);
                Ok(packet)
            }
            Err(err) => {
                self.metrics.record_decode_error();
                metrics::counter!("index_decode_errors_total").increment(1);
                Err(WindowError::decode(&handle.id, err.to_string()))
            }
        }
    }
}

/// Canonical file name for a packet: `<station_id>_<start_us>_<end_us>.rpkt`.
pub fn packet_file_name(packet: &RawPacket) -> String {
    format!(
        "{}_{}_{}.{}",
        packet.station_id,
        packet.start_us as u64,
        packet.end_us as u64,
        PACKET_EXTENSION
    )
}

/// Write one packet into an archive root, honoring the layout flag.
pub fn write_packet(
    root: &Path,
    structured: bool,
    packet: &RawPacket,
) -> Result<PathBuf, WindowError> {
    let dir = if structured {
        root.join(packet.station_id.as_str())
    } else {
        root.to_path_buf()
    };
    std::fs::create_dir_all(&dir)?;

    let path = dir.join(packet_file_name(packet));
    let bytes = bincode::serialize(packet)
        .map_err(|err| WindowError::Other(format!("packet encode failed: {err}")))?;
    std::fs::write(&path, bytes)?;
    Ok(path)
}

fn api_from_extension(ext: &str) -> Option<ApiVersion> {
    match ext {
        PACKET_EXTENSION => Some(ApiVersion::V1000),
        LEGACY_EXTENSION => Some(ApiVersion::V900),
        _ => None,
    }
}

/// Parse `<station_id>_<start_us>_<end_us>`; station ids may themselves
/// contain underscores, so the two trailing fields bind first.
fn parse_file_stem(stem: &str) -> Option<(StationId, f64, f64)> {
    let (rest, end) = stem.rsplit_once('_')?;
    let (station, start) = rest.rsplit_once('_')?;
    if station.is_empty() {
        return None;
    }
    let start_us: u64 = start.parse().ok()?;
    let end_us: u64 = end.parse().ok()?;
    Some((StationId::new(station), start_us as f64, end_us as f64))
}
