//! # Persistence
//!
//! Save/load of finalized window state.
//!
//! The binary format is bincode over `WindowState`, which round-trips every
//! numeric field bit-for-bit; a loaded window reconstructs its stations
//! without re-running discovery. JSON export exists for inspection only and
//! makes no round-trip guarantee.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use contracts::WindowState;
use thiserror::Error;
use tracing::{debug, instrument};

/// Magic prefix identifying a window file.
const MAGIC: &[u8; 4] = b"SLW1";

/// Persistence-specific errors
#[derive(Debug, Error)]
pub enum PersistError {
    /// Not a window file or wrong format revision
    #[error("'{path}' is not a window file (bad magic)")]
    BadMagic { path: String },

    /// Encode/decode failure
    #[error("window codec error: {message}")]
    Codec { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}

/// Write a finalized window to disk.
#[instrument(name = "persistence_save", skip(state), fields(path = %path.as_ref().display(), stations = state.station_count()))]
pub fn save_window(path: impl AsRef<Path>, state: &WindowState) -> Result<(), PersistError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    writer.write_all(MAGIC)?;
    bincode::serialize_into(&mut writer, state).map_err(PersistError::codec)?;
    writer.flush()?;

    debug!(stations = state.station_count(), "window saved");
    Ok(())
}

/// Load a window previously written by [`save_window`].
#[instrument(name = "persistence_load", fields(path = %path.as_ref().display()))]
pub fn load_window(path: impl AsRef<Path>) -> Result<WindowState, PersistError> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    std::io::Read::read_exact(&mut reader, &mut magic)?;
    if &magic != MAGIC {
        return Err(PersistError::BadMagic {
            path: path.as_ref().display().to_string(),
        });
    }

    let state: WindowState =
        bincode::deserialize_from(&mut reader).map_err(PersistError::codec)?;
    debug!(stations = state.station_count(), "window loaded");
    Ok(state)
}

/// Pretty JSON rendering of a window, for humans and tooling.
pub fn to_json(state: &WindowState) -> Result<String, PersistError> {
    serde_json::to_string_pretty(state).map_err(PersistError::codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        DataWindowConfig, SensorSeries, SensorType, Station, StationFingerprint, StationKey,
        ValueColumn,
    };
    use tempfile::tempdir;

    fn sample_state() -> WindowState {
        let mut station = Station::new(
            StationKey {
                id: "s1".into(),
                uuid: "u1".into(),
                session_start_us: 123.456,
            },
            StationFingerprint {
                make: "acme".into(),
                model: "m1".into(),
                os: "ios".into(),
                app_version: "2.0".into(),
                is_private: true,
                audio_sample_rate_hz: 800.0,
            },
        );
        let mut audio = SensorSeries::new(SensorType::Audio, 800.0);
        // Deliberately awkward floats to catch any lossy encoding
        audio.timestamps = vec![0.1, 0.1 + 1.0 / 3.0, 7.0 / 11.0];
        audio.columns = vec![ValueColumn::continuous(
            "audio",
            vec![f64::MIN_POSITIVE, -0.0, std::f64::consts::PI],
        )];
        station.sensors.insert(SensorType::Audio, audio);

        WindowState {
            config: DataWindowConfig::new("/archive"),
            origin: None,
            event_name: "dw_2026-08-07_1".into(),
            start_us: Some(0.1),
            end_us: Some(1.0e15),
            stations: vec![station],
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_roundtrip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("window.slw");

        let state = sample_state();
        save_window(&path, &state).unwrap();
        let loaded = load_window(&path).unwrap();

        assert_eq!(loaded.event_name, state.event_name);
        assert_eq!(loaded.stations.len(), state.stations.len());

        let (a, b) = (&loaded.stations[0], &state.stations[0]);
        assert_eq!(a.key, b.key);
        let (sa, sb) = (a.audio().unwrap(), b.audio().unwrap());
        assert_eq!(sa.len(), sb.len());
        for (x, y) in sa.timestamps.iter().zip(&sb.timestamps) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        for (x, y) in sa.columns[0].values.iter().zip(&sb.columns[0].values) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.slw");
        std::fs::write(&path, b"XXXXnot a window").unwrap();

        let err = load_window(&path).unwrap_err();
        assert!(matches!(err, PersistError::BadMagic { .. }));
    }

    #[test]
    fn test_truncated_file_is_codec_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("window.slw");
        save_window(&path, &sample_state()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let err = load_window(&path).unwrap_err();
        assert!(matches!(err, PersistError::Codec { .. }));
    }

    #[test]
    fn test_json_export_renders() {
        let json = to_json(&sample_state()).unwrap();
        assert!(json.contains("\"event_name\""));
        assert!(json.contains("dw_2026-08-07_1"));
    }
}
