//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    input_dir: String,
    structured_layout: bool,
    bounded: bool,
    station_filters: usize,
    parallel_workers: usize,
    edge_policy: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    input_dir: config.input_dir.display().to_string(),
                    structured_layout: config.structured_layout,
                    bounded: config.start_us.is_some() && config.end_us.is_some(),
                    station_filters: config.station_ids.len(),
                    parallel_workers: config.parallel_workers,
                    edge_policy: format!("{:?}", config.edge_policy),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &contracts::DataWindowConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.start_us.is_none() || config.end_us.is_none() {
        warnings.push(
            "window bounds unset - the engine will use whatever time span is discovered"
                .to_string(),
        );
    }

    if config.start_buffer_s < 0.0 || config.end_buffer_s < 0.0 {
        warnings.push("negative query buffers clamp to zero".to_string());
    }

    if !config.apply_correction {
        warnings.push("clock correction disabled - timestamps stay on device clocks".to_string());
    }

    if config.parallel_workers == 0 {
        warnings.push("parallel_workers 0 behaves like 1 (sequential decode)".to_string());
    }

    warnings
}


fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Archive: {}", summary.input_dir);
            println!("  Structured layout: {}", summary.structured_layout);
            println!("  Bounded request: {}", summary.bounded);
            println!("  Station filters: {}", summary.station_filters);
            println!("  Workers: {}", summary.parallel_workers);
            println!("  Edge policy: {}", summary.edge_policy);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
