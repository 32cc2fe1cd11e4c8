//! Series assembly operations.
//!
//! `SensorSeries` itself is a frozen contract type; everything that mutates
//! one during assembly lives here: channel concatenation, sort/dedup,
//! timestamp correction and range trimming.

use contracts::{OffsetModel, SensorChannel, SensorSeries, WindowError};

/// Append one packet's channel onto a series.
///
/// The first channel establishes the column schema; later channels must
/// match it by name, kind and arity or they are rejected whole.
pub fn append_channel(series: &mut SensorSeries, channel: &SensorChannel) -> Result<(), WindowError> {
    if !channel.is_well_formed() {
        return Err(WindowError::Other(format!(
            "ragged {} channel: column lengths disagree with timestamps",
            channel.sensor
        )));
    }

    if series.columns.is_empty() && series.timestamps.is_empty() {
        series.timestamps = channel.timestamps.clone();
        series.columns = channel.columns.clone();
        return Ok(());
    }

    if !schema_matches(series, channel) {
        return Err(WindowError::Other(format!(
            "{} channel column schema changed mid-session",
            channel.sensor
        )));
    }

    series.timestamps.extend_from_slice(&channel.timestamps);
    for (column, incoming) in series.columns.iter_mut().zip(&channel.columns) {
        column.values.extend_from_slice(&incoming.values);
    }
    Ok(())
}

fn schema_matches(series: &SensorSeries, channel: &SensorChannel) -> bool {
    series.columns.len() == channel.columns.len()
        && series
            .columns
            .iter()
            .zip(&channel.columns)
            .all(|(a, b)| a.name == b.name && a.kind == b.kind)
}

/// Sort samples by timestamp and drop duplicate instants, keeping the first
/// occurrence. The same permutation is applied to every value column.
pub fn sort_dedup(series: &mut SensorSeries) {
    let n = series.timestamps.len();
    if n < 2 {
        return;
    }

    // Fast path: already strictly increasing
    if series.timestamps.windows(2).all(|w| w[0] < w[1]) {
        return;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| series.timestamps[a].total_cmp(&series.timestamps[b]));

    let mut kept: Vec<usize> = Vec::with_capacity(n);
    for &idx in &order {
        match kept.last() {
            Some(&prev) if series.timestamps[prev] >= series.timestamps[idx] => {}
            _ => kept.push(idx),
        }
    }

    series.timestamps = kept.iter().map(|&i| series.timestamps[i]).collect();
    for column in &mut series.columns {
        column.values = kept.iter().map(|&i| column.values[i]).collect();
    }
}

/// Correct every timestamp to reference time.
///
/// Guarded by `is_corrected` so reassembly and re-finalization never apply
/// the model twice.
pub fn apply_offset(series: &mut SensorSeries, model: &OffsetModel, use_model: bool) {
    if series.is_corrected || model.is_empty() {
        return;
    }
    for ts in &mut series.timestamps {
        *ts = model.correct_timestamp(*ts, use_model);
    }
    series.is_corrected = true;
}

/// Keep only samples inside the half-open range [start_us, end_us).
pub fn trim(series: &mut SensorSeries, start_us: f64, end_us: f64) {
    let lo = series.timestamps.partition_point(|&t| t < start_us);
    let hi = series.timestamps.partition_point(|&t| t < end_us);

    if lo == 0 && hi == series.timestamps.len() {
        return;
    }

    series.timestamps = series.timestamps[lo..hi].to_vec();
    for column in &mut series.columns {
        column.values = column.values[lo..hi].to_vec();
    }
}
