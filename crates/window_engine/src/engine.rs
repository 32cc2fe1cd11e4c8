//! Two-phase window query state machine.
//!
//! INIT computes the buffered query range, QUERY1 discovers and assembles
//! everything inside it, CHECK_COVERAGE tests whether corrected station data
//! reaches both requested edges, and at most one QUERY2 round extends the
//! failing sides before the shared finalize pass trims, pads and seals the
//! result.

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    CandidateFilter, DataWindowConfig, ErrorRecord, PacketHandle, PacketIndex, RawPacket,
    SensorType, Station, StationKey, TimeRange, WindowError, WindowSide, WindowState, US_PER_S,
};
use tracing::{debug, info, instrument, warn};

use crate::assembler::{AssemblerConfig, StationAssembler};
use crate::gap_fill::GapPadEngine;
use crate::series;

/// Buffer growth factor for the second query round.
const EXPANSION_FACTOR: f64 = 1.5;

/// Tolerance for edge comparisons, microseconds.
const EDGE_TOL_US: f64 = 1.0;

/// One station's coverage failure on one side.
#[derive(Debug, Clone)]
struct CoverageFailure {
    key: StationKey,
    side: WindowSide,
    shortfall_us: f64,
}

/// Outcome of a coverage check over all stations.
#[derive(Debug, Default)]
struct CoverageReport {
    failures: Vec<CoverageFailure>,
}

impl CoverageReport {
    fn satisfied(&self) -> bool {
        self.failures.is_empty()
    }

    /// Largest shortfall for a side, or None when that side passed.
    fn shortfall(&self, side: WindowSide) -> Option<f64> {
        self.failures
            .iter()
            .filter(|f| f.side == side)
            .map(|f| f.shortfall_us)
            .fold(None, |acc, s| Some(acc.map_or(s, |a: f64| a.max(s))))
    }
}

/// Orchestrates discovery, assembly, coverage expansion and finalize.
pub struct WindowQueryEngine {
    config: DataWindowConfig,
    assembler: StationAssembler,
}

impl WindowQueryEngine {
    pub fn new(config: DataWindowConfig) -> Self {
        let assembler = StationAssembler::new(AssemblerConfig::from(&config));
        Self { config, assembler }
    }

    /// Run the full state machine against a packet index.
    ///
    /// Fails fast only on configuration-contract violations; everything else
    /// is accumulated into the returned state's error lists.
    #[instrument(name = "engine_run", skip(self, index), fields(input = %self.config.input_dir.display()))]
    pub async fn run(&self, index: Arc<dyn PacketIndex>) -> Result<WindowState, WindowError> {
        self.validate_config()?;

        let mut errors: Vec<ErrorRecord> = Vec::new();

        // INIT: buffered query range, negative buffers clamped to zero
        let start_buffer_us = self.config.start_buffer_s.max(0.0) * US_PER_S;
        let end_buffer_us = self.config.end_buffer_s.max(0.0) * US_PER_S;
        let query_start_us = self.config.start_us.map(|s| s - start_buffer_us);
        let query_end_us = self.config.end_us.map(|e| e + end_buffer_us);

        // QUERY1
        let range = TimeRange {
            start_us: query_start_us,
            end_us: query_end_us,
        };
        let handles = self.list(&index, range, &mut errors);
        let mut seen: HashSet<String> = handles.iter().map(|h| h.id.clone()).collect();
        let mut pool = self.decode_batch(&index, handles, &mut errors).await;

        // Unset bounds defer to whatever QUERY1 discovered
        let requested_start_us = self.config.start_us.or_else(|| {
            pool.iter()
                .map(|p| p.start_us)
                .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.min(t))))
        });
        let requested_end_us = self.config.end_us.or_else(|| {
            pool.iter()
                .map(|p| p.end_us)
                .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
        });

        let mut stations = self.assembler.assemble(pool.clone());
        info!(
            stations = stations.len(),
            packets = pool.len(),
            "first query assembled"
        );

        // CHECK_COVERAGE: only meaningful when the caller pinned the bounds.
        // A shortfall inside the query buffer cannot be helped by a second
        // query (the buffered listing already covered that span), so only
        // shortfalls beyond the buffer trigger expansion.
        let explicit_bounds = self.config.start_us.is_some() && self.config.end_us.is_some();
        if explicit_bounds {
            let report = self.check_coverage(
                &stations,
                requested_start_us,
                requested_end_us,
                start_buffer_us,
                end_buffer_us,
            );
            if !report.satisfied() {
                // QUERY2: extend only the failing sides, keep prior work
                let extra = self
                    .expand_query(&index, &report, query_start_us, query_end_us, &mut seen, &mut errors)
                    .await;
                if !extra.is_empty() {
                    pool.extend(extra);
                    stations = self.assembler.assemble(pool.clone());
                }

                // CHECK_COVERAGE2: one expansion round only; stations whose
                // corrected data still misses the strict bounds are recorded
                // and the build proceeds with partial data
                let report2 = self.check_coverage(
                    &stations,
                    requested_start_us,
                    requested_end_us,
                    0.0,
                    0.0,
                );
                self.record_coverage_failures(&report2, &mut stations, &mut errors);
            }
        }
        drop(pool);

        // Finalize (shared by both paths)
        let mut state = WindowState {
            config: self.config.clone(),
            origin: None,
            event_name: self.config.event_name.clone(),
            start_us: requested_start_us,
            end_us: requested_end_us,
            stations,
            errors,
        };
        self.finalize(&mut state);

        if state.stations.is_empty() {
            // Empty windows are a valid outcome, surfaced as a warning-level
            // record rather than a failure
            let err = WindowError::EmptyResult;
            debug!("window finalized empty");
            state.errors.push(ErrorRecord::window_level(&err));
        }

        metrics::counter!("window_builds_total").increment(1);
        info!(
            stations = state.stations.len(),
            errors = state.errors.len(),
            event = %state.event_name,
            "window finalized"
        );
        Ok(state)
    }

    /// Finalize pass: trim to the requested range, fabricate edge samples,
    /// pin non-audio sensors to the audio span and resolve metadata.
    ///
    /// Idempotent: running it again over an already-finalized state changes
    /// nothing.
    #[instrument(name = "engine_finalize", skip_all, fields(stations = state.stations.len()))]
    pub fn finalize(&self, state: &mut WindowState) {
        if let (Some(start_us), Some(end_us)) = (state.start_us, state.end_us) {
            let drained: Vec<Station> = state.stations.drain(..).collect();
            for mut station in drained {
                match self.finalize_station(&mut station, start_us, end_us) {
                    Ok(()) => state.stations.push(station),
                    Err(err) => {
                        warn!(station = %station.key, error = %err, "station dropped at finalize");
                        state.errors.push(ErrorRecord::for_station(station.key.clone(), &err));
                        metrics::counter!("window_stations_dropped_total").increment(1);
                    }
                }
            }
        }

        self.resolve_event_name(state);
    }

    /// Trim and pad one station. Errors mean the station is dropped.
    fn finalize_station(
        &self,
        station: &mut Station,
        start_us: f64,
        end_us: f64,
    ) -> Result<(), WindowError> {
        let policy = self.config.edge_policy;
        let threshold_s = self.config.gap_threshold_s;

        // Audio is the reference sensor: trim it to [start, end) and make it
        // span the window flush to both edges.
        let audio = station
            .sensors
            .get_mut(&SensorType::Audio)
            .ok_or_else(|| WindowError::EmptyStation {
                station_id: station.key.id.to_string(),
            })?;
        series::trim(audio, start_us, end_us);
        if audio.is_empty() {
            return Err(WindowError::EmptyStation {
                station_id: station.key.id.to_string(),
            });
        }

        if let Some(engine) = GapPadEngine::for_series(audio, threshold_s, policy) {
            engine.fabricate_start(audio, start_us);
            // The series is half-open on the right, so the end edge sample
            // sits one interval inside the requested end.
            let interval_us = engine.sample_interval_s * US_PER_S;
            let end_edge_us = end_us - interval_us;
            if end_edge_us > start_us {
                engine.fabricate_end(audio, end_edge_us);
            }
            engine.fill(audio);
        }

        let audio_first = audio.first_timestamp().unwrap_or(start_us);
        let audio_last = audio.last_timestamp().unwrap_or(audio_first);

        // Non-audio sensors: trim, then pin to the audio span so every
        // sensor shares common start/end instants.
        let others: Vec<SensorType> = station
            .sensors
            .keys()
            .copied()
            .filter(|s| !s.is_audio())
            .collect();
        for sensor in others {
            let Some(series_ref) = station.sensors.get_mut(&sensor) else {
                continue;
            };
            series::trim(series_ref, start_us, end_us);
            if series_ref.is_empty() {
                // Nothing left to anchor fabrication on
                station.sensors.remove(&sensor);
                continue;
            }

            let interval_s = series_ref
                .nominal_interval_us()
                .map(|us| us / US_PER_S)
                .unwrap_or(0.0);
            let pad = GapPadEngine::new(interval_s, threshold_s, policy);
            pad.fabricate_start(series_ref, audio_first);
            pad.fabricate_end(series_ref, audio_last);
        }

        if station.is_data_empty() {
            return Err(WindowError::EmptyStation {
                station_id: station.key.id.to_string(),
            });
        }
        Ok(())
    }

    /// The only fatal check: a config with no input location aborts before
    /// any I/O.
    fn validate_config(&self) -> Result<(), WindowError> {
        if self.config.input_dir.as_os_str().is_empty() {
            return Err(WindowError::config_validation(
                "input_dir",
                "no input location configured",
            ));
        }
        if let (Some(start), Some(end)) = (self.config.start_us, self.config.end_us) {
            if start >= end {
                return Err(WindowError::config_validation(
                    "start_us/end_us",
                    format!("start {start} must precede end {end}"),
                ));
            }
        }
        Ok(())
    }

    fn filter_for(&self, range: TimeRange) -> CandidateFilter {
        CandidateFilter {
            range,
            station_ids: self.config.station_ids.clone(),
            extensions: self.config.extensions.clone(),
            api_versions: self.config.api_versions.clone(),
        }
    }

    /// Discovery; index failures are recorded, not fatal.
    #[instrument(name = "engine_list", skip(self, index, errors))]
    fn list(
        &self,
        index: &Arc<dyn PacketIndex>,
        range: TimeRange,
        errors: &mut Vec<ErrorRecord>,
    ) -> Vec<PacketHandle> {
        let mut handles = match index.list_candidates(&self.filter_for(range)) {
            Ok(handles) => handles,
            Err(err) => {
                warn!(error = %err, "candidate listing failed");
                errors.push(ErrorRecord::window_level(&err));
                return Vec::new();
            }
        };

        // Prune on header hints before paying for a full decode
        handles.retain(|h| match (h.start_hint_us, h.end_hint_us) {
            (Some(s), Some(e)) => range.overlaps(s, e),
            _ => true,
        });
        metrics::counter!("window_candidates_listed_total").increment(handles.len() as u64);
        handles
    }

    /// Decode a handle batch, fanning out across blocking workers when the
    /// config asks for more than one.
    ///
    /// The worker merge is a barrier join; identity-key collisions across
    /// batches are resolved later by the assembler's concatenate-then-sort,
    /// so the result is identical to the sequential path.
    async fn decode_batch(
        &self,
        index: &Arc<dyn PacketIndex>,
        handles: Vec<PacketHandle>,
        errors: &mut Vec<ErrorRecord>,
    ) -> Vec<RawPacket> {
        let workers = self.config.parallel_workers.max(1);
        if workers <= 1 || handles.len() < 2 {
            return Self::decode_serial(index.as_ref(), handles, errors);
        }

        let chunk = handles.len().div_ceil(workers);
        let mut joins = Vec::new();
        for (worker, batch) in handles.chunks(chunk).map(<[PacketHandle]>::to_vec).enumerate() {
            let index = Arc::clone(index);
            joins.push((
                worker,
                tokio::task::spawn_blocking(move || {
                    let mut errs = Vec::new();
                    let packets = Self::decode_serial(index.as_ref(), batch, &mut errs);
                    (packets, errs)
                }),
            ));
        }

        let mut packets = Vec::new();
        for (worker, join) in joins {
            match join.await {
                Ok((mut batch_packets, batch_errors)) => {
                    packets.append(&mut batch_packets);
                    errors.extend(batch_errors);
                }
                Err(join_err) => {
                    // Partial results of a dead worker are discarded
                    let err = WindowError::Worker {
                        worker,
                        message: join_err.to_string(),
                    };
                    warn!(worker, error = %err, "decode worker failed");
                    errors.push(ErrorRecord::window_level(&err));
                }
            }
        }
        packets
    }

    fn decode_serial(
        index: &dyn PacketIndex,
        handles: Vec<PacketHandle>,
        errors: &mut Vec<ErrorRecord>,
    ) -> Vec<RawPacket> {
        let mut packets = Vec::with_capacity(handles.len());
        for handle in handles {
            match index.decode(&handle) {
                Ok(packet) => {
                    metrics::counter!("window_packets_decoded_total").increment(1);
                    packets.push(packet);
                }
                Err(err) => {
                    warn!(handle = %handle.id, error = %err, "packet decode failed, skipping");
                    metrics::counter!("window_decode_errors_total").increment(1);
                    errors.push(ErrorRecord::window_level(&err));
                }
            }
        }
        packets
    }

    /// Corrected first/last instants for one station.
    ///
    /// With correction enabled the series already carry reference time; with
    /// it disabled the model is still consulted so coverage reflects where
    /// the data would land.
    fn corrected_span(&self, station: &Station) -> Option<(f64, f64)> {
        let first = station.first_timestamp()?;
        let last = station.last_timestamp()?;
        if self.config.apply_correction {
            Some((first, last))
        } else {
            let model = &station.offset_model;
            Some((
                model.correct_timestamp(first, self.config.use_offset_model),
                model.correct_timestamp(last, self.config.use_offset_model),
            ))
        }
    }

    /// Coverage conditions per station: corrected earliest must reach the
    /// requested start and corrected latest must pass the requested end,
    /// each with a per-side tolerance margin.
    ///
    /// The first pass uses the query buffers as margins (a shortfall the
    /// buffered listing already covered gains nothing from re-querying);
    /// the post-expansion pass uses zero margins so remaining shortfalls
    /// are recorded.
    #[instrument(name = "engine_check_coverage", skip(self, stations), fields(stations = stations.len()))]
    fn check_coverage(
        &self,
        stations: &[Station],
        requested_start_us: Option<f64>,
        requested_end_us: Option<f64>,
        start_margin_us: f64,
        end_margin_us: f64,
    ) -> CoverageReport {
        let mut report = CoverageReport::default();
        let (Some(start_us), Some(end_us)) = (requested_start_us, requested_end_us) else {
            return report;
        };

        for station in stations {
            let Some((earliest, latest)) = self.corrected_span(station) else {
                continue;
            };
            if earliest > start_us + start_margin_us + EDGE_TOL_US {
                report.failures.push(CoverageFailure {
                    key: station.key.clone(),
                    side: WindowSide::Start,
                    shortfall_us: earliest - start_us,
                });
            }
            if latest < end_us - end_margin_us - EDGE_TOL_US {
                report.failures.push(CoverageFailure {
                    key: station.key.clone(),
                    side: WindowSide::End,
                    shortfall_us: end_us - latest,
                });
            }
        }
        report
    }

    /// QUERY2: list and decode only the newly exposed sub-ranges, growing
    /// each failing side's buffer by 1.5x its observed shortfall.
    async fn expand_query(
        &self,
        index: &Arc<dyn PacketIndex>,
        report: &CoverageReport,
        query_start_us: Option<f64>,
        query_end_us: Option<f64>,
        seen: &mut HashSet<String>,
        errors: &mut Vec<ErrorRecord>,
    ) -> Vec<RawPacket> {
        let mut new_handles: Vec<PacketHandle> = Vec::new();

        if let (Some(shortfall), Some(query_start)) =
            (report.shortfall(WindowSide::Start), query_start_us)
        {
            let extension_us = EXPANSION_FACTOR * shortfall;
            if extension_us > 0.0 {
                debug!(extension_us, "expanding query start");
                metrics::counter!("window_query_expansions_total", "side" => "start").increment(1);
                let range = TimeRange::new(query_start - extension_us, query_start);
                new_handles.extend(self.list(index, range, errors));
            }
        }
        if let (Some(shortfall), Some(query_end)) =
            (report.shortfall(WindowSide::End), query_end_us)
        {
            let extension_us = EXPANSION_FACTOR * shortfall;
            if extension_us > 0.0 {
                debug!(extension_us, "expanding query end");
                metrics::counter!("window_query_expansions_total", "side" => "end").increment(1);
                let range = TimeRange::new(query_end, query_end + extension_us);
                new_handles.extend(self.list(index, range, errors));
            }
        }

        // Incremental: anything already decoded in QUERY1 stays decoded
        new_handles.retain(|h| seen.insert(h.id.clone()));
        self.decode_batch(index, new_handles, errors).await
    }

    /// After the single expansion round, remaining failures become
    /// warning-level records on the window and the station.
    fn record_coverage_failures(
        &self,
        report: &CoverageReport,
        stations: &mut [Station],
        errors: &mut Vec<ErrorRecord>,
    ) {
        for failure in &report.failures {
            let err = WindowError::CoverageUnsatisfied {
                station_id: failure.key.id.to_string(),
                side: failure.side,
                shortfall_us: failure.shortfall_us,
            };
            warn!(station = %failure.key, error = %err, "coverage still unsatisfied after expansion");
            metrics::counter!("window_coverage_unsatisfied_total").increment(1);
            errors.push(ErrorRecord {
                station: Some(failure.key.clone()),
                kind: err.kind(),
                message: err.to_string(),
            });
            if let Some(station) = stations.iter_mut().find(|s| s.key == failure.key) {
                station.record_error(&err);
            }
        }
    }

    /// Default event name `dw_<start_date>_<station_count>` when the caller
    /// left the placeholder.
    fn resolve_event_name(&self, state: &mut WindowState) {
        if !self.config.has_placeholder_name() {
            state.event_name = self.config.event_name.clone();
            return;
        }
        let date = state
            .start_us
            .and_then(|s| chrono::DateTime::from_timestamp((s / US_PER_S) as i64, 0))
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        state.event_name = format!("dw_{}_{}", date, state.stations.len());
    }
}
