//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON window request files
//! - Validate configuration legality before the engine runs
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("window.toml")).unwrap();
//! println!("Archive: {}", config.input_dir.display());
//! ```

mod parser;
mod validator;

pub use contracts::DataWindowConfig;
pub use parser::ConfigFormat;

use contracts::WindowError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path
    ///
    /// Automatically detects format from the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DataWindowConfig, WindowError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from a string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<DataWindowConfig, WindowError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize a config to a TOML string
    pub fn to_toml(config: &DataWindowConfig) -> Result<String, WindowError> {
        toml::to_string_pretty(config)
            .map_err(|e| WindowError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a config to a JSON string
    pub fn to_json(config: &DataWindowConfig) -> Result<String, WindowError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| WindowError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from the file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, WindowError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            WindowError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            WindowError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, WindowError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
