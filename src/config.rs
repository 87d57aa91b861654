//! Pipeline configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$PAYPROOF_CONFIG` (environment variable)
//! 2. `~/.config/payproof/config.toml` (Linux/macOS)
//!    `%APPDATA%\payproof\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Mail credentials are not part of this file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PayproofError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub general: GeneralConfig,
    /// Per-message fetch settings.
    pub fetch: FetchConfig,
    /// Which attachments are treated as notification documents.
    pub documents: DocumentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for the log file. Defaults to the user cache directory.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Deadline for processing one message, in seconds (0 = none).
    pub deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Content types handed to the layout extractor.
    pub pdf_content_types: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { deadline_secs: 60 }
    }
}

impl FetchConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            pdf_content_types: vec!["application/pdf".to_string(), "application/x-pdf".to_string()],
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let Some(path) = config_file_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match load_config_from(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            Config::default()
        }
    }
}

/// Load configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| PayproofError::Config(format!("{}: {e}", path.display())))?;
    toml::from_str(&contents).map_err(|e| PayproofError::Config(format!("{}: {e}", path.display())))
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("PAYPROOF_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("payproof").join("config.toml"))
}

/// Return the directory for log files.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("payproof")
}
