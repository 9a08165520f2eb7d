//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$RETSWIRE_CONFIG` (environment variable)
//! 2. `~/.config/retswire/config.toml` (Linux/macOS)
//!    `%APPDATA%\retswire\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::parser::compact::DEFAULT_LIST_NAME;
use crate::parser::multipart::{DecodeOptions, DEFAULT_MAX_FIELDS, DEFAULT_MAX_FIELDS_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Multipart decoder limits.
    pub multipart: MultipartConfig,
    /// Tabular decoder settings.
    pub compact: CompactConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Multipart decoder limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    /// Maximum number of field parts kept per body.
    pub max_fields: usize,
    /// Maximum total size of field text per body, in bytes.
    pub max_fields_size: usize,
    /// Fail when the boundary never appears in a non-empty body.
    pub strict_boundary: bool,
}

/// Tabular decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactConfig {
    /// List name for metadata records when none is given.
    pub default_list_name: String,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory for extracted parts.
    pub default_output_dir: Option<PathBuf>,
    /// CSV field separator character.
    pub csv_separator: char,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_fields: DEFAULT_MAX_FIELDS,
            max_fields_size: DEFAULT_MAX_FIELDS_SIZE,
            strict_boundary: false,
        }
    }
}

impl Default for CompactConfig {
    fn default() -> Self {
        Self {
            default_list_name: DEFAULT_LIST_NAME.to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            csv_separator: ',',
        }
    }
}

impl Config {
    /// Decoder options derived from the `[multipart]` section.
    pub fn multipart_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_fields: self.multipart.max_fields,
            max_fields_size: self.multipart.max_fields_size,
            strict_boundary: self.multipart.strict_boundary,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from the first location that has a file.
///
/// A missing file means defaults. An unreadable or invalid file is logged
/// and also yields defaults.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.exists()) else {
        return Config::default();
    };
    match read_config(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring config file, using defaults");
            Config::default()
        }
    }
}

/// Read and parse one config file.
pub fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| DecodeError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Invalid config '{}': {e}", path.display()))
}

/// Config file location: `$RETSWIRE_CONFIG` if set and non-empty, else
/// `<config dir>/retswire/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    match std::env::var_os("RETSWIRE_CONFIG") {
        Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => dirs::config_dir().map(|d| d.join("retswire").join("config.toml")),
    }
}

/// Directory for the log file: `general.cache_dir`, else
/// `<cache dir>/retswire`, else `./retswire`.
pub fn cache_dir(config: &Config) -> PathBuf {
    config.general.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retswire")
    })
}

/// Path of the log file written by the CLI.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("retswire.log")
}
