//! Config validation.
//!
//! Rules:
//! - input_dir non-empty (the only fatal contract of the engine, caught
//!   here before any I/O)
//! - start < end when both bounds are set
//! - gap threshold non-negative and finite
//! - no duplicate station id filters
//! - fetch retries bounded

use std::collections::HashSet;

use contracts::{DataWindowConfig, WindowError};

const MAX_FETCH_RETRIES: u32 = 10;

/// Validate a DataWindowConfig.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &DataWindowConfig) -> Result<(), WindowError> {
    validate_input(config)?;
    validate_range(config)?;
    validate_gap_threshold(config)?;
    validate_station_filters(config)?;
    validate_retries(config)?;
    Ok(())
}

fn validate_input(config: &DataWindowConfig) -> Result<(), WindowError> {
    if config.input_dir.as_os_str().is_empty() {
        return Err(WindowError::config_validation(
            "input_dir",
            "no input location configured",
        ));
    }
    Ok(())
}

fn validate_range(config: &DataWindowConfig) -> Result<(), WindowError> {
    if let (Some(start), Some(end)) = (config.start_us, config.end_us) {
        if !start.is_finite() || !end.is_finite() {
            return Err(WindowError::config_validation(
                "start_us/end_us",
                "window bounds must be finite",
            ));
        }
        if start >= end {
            return Err(WindowError::config_validation(
                "start_us/end_us",
                format!("start ({start}) must precede end ({end})"),
            ));
        }
    }
    Ok(())
}

fn validate_gap_threshold(config: &DataWindowConfig) -> Result<(), WindowError> {
    if !config.gap_threshold_s.is_finite() || config.gap_threshold_s < 0.0 {
        return Err(WindowError::config_validation(
            "gap_threshold_s",
            format!(
                "gap threshold must be a non-negative duration, got {}",
                config.gap_threshold_s
            ),
        ));
    }
    Ok(())
}

fn validate_station_filters(config: &DataWindowConfig) -> Result<(), WindowError> {
    let mut seen = HashSet::new();
    for id in &config.station_ids {
        if !seen.insert(id.as_str()) {
            return Err(WindowError::config_validation(
                format!("station_ids[{id}]"),
                "duplicate station id filter",
            ));
        }
    }
    Ok(())
}

fn validate_retries(config: &DataWindowConfig) -> Result<(), WindowError> {
    if config.fetch_retries > MAX_FETCH_RETRIES {
        return Err(WindowError::config_validation(
            "fetch_retries",
            format!(
                "fetch_retries {} exceeds the maximum of {MAX_FETCH_RETRIES}",
                config.fetch_retries
            ),
        ));
    }
    Ok(())
}
