//! DataWindow facade.
//!
//! Owns the configuration, runs the query engine once at construction and
//! exposes the finalized stations. No mutation API beyond a serialization
//! round trip handled by the persistence crate via `WindowState`.

use std::sync::Arc;

use contracts::{
    DataWindowConfig, ErrorRecord, EventOrigin, PacketIndex, Station, WindowError, WindowState,
};

/// Finalized window handle.
///
/// Eager: the build happens inside [`DataWindow::build`]; afterwards the
/// window only answers queries.
#[derive(Debug, Clone)]
pub struct DataWindow {
    state: WindowState,
}

impl DataWindow {
    /// Build a window from a config and a packet index.
    ///
    /// Fails only on configuration-contract violations; an archive with no
    /// matching packets yields an empty window, not an error.
    pub async fn build(
        config: DataWindowConfig,
        origin: Option<EventOrigin>,
        index: Arc<dyn PacketIndex>,
    ) -> Result<Self, WindowError> {
        let engine = crate::WindowQueryEngine::new(config);
        let mut state = engine.run(index).await?;
        state.origin = origin;
        Ok(Self { state })
    }

    /// Rehydrate a window from previously persisted state.
    pub fn from_state(state: WindowState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn into_state(self) -> WindowState {
        self.state
    }

    pub fn stations(&self) -> &[Station] {
        &self.state.stations
    }

    /// Stations matching an id and optional uuid / session-start filters.
    pub fn get_station(
        &self,
        id: &str,
        uuid: Option<&str>,
        session_start_us: Option<f64>,
    ) -> Vec<&Station> {
        self.state
            .stations
            .iter()
            .filter(|s| s.key.id == id)
            .filter(|s| uuid.map_or(true, |u| s.key.uuid == u))
            .filter(|s| {
                session_start_us
                    .map_or(true, |t| s.key.session_start_us.to_bits() == t.to_bits())
            })
            .collect()
    }

    /// First station, optionally restricted to an id.
    pub fn first_station(&self, id: Option<&str>) -> Option<&Station> {
        self.state
            .stations
            .iter()
            .find(|s| id.map_or(true, |i| s.key.id == i))
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.state.errors
    }

    pub fn event_name(&self) -> &str {
        &self.state.event_name
    }

    pub fn start_us(&self) -> Option<f64> {
        self.state.start_us
    }

    pub fn end_us(&self) -> Option<f64> {
        self.state.end_us
    }

    pub fn origin(&self) -> Option<&EventOrigin> {
        self.state.origin.as_ref()
    }
}
