//! Config parsing.
//!
//! TOML (primary) and JSON formats, selected by file extension.

use contracts::{DataWindowConfig, WindowError};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML config
pub fn parse_toml(content: &str) -> Result<DataWindowConfig, WindowError> {
    toml::from_str(content)
        .map_err(|e| WindowError::config_parse(format!("TOML parse error: {e}")))
}

/// Parse a JSON config
pub fn parse_json(content: &str) -> Result<DataWindowConfig, WindowError> {
    serde_json::from_str(content)
        .map_err(|e| WindowError::config_parse(format!("JSON parse error: {e}")))
}

/// Parse by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<DataWindowConfig, WindowError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}
