//! Persisted editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[serde(default)]` fills missing fields from `Default::default()`, so
//! a file holding only `{"project_path": "..."}` still loads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use codepad_syntax::{StyleMap, SyntaxError};

/// Main editor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last-used project directory
    pub project_path: Option<PathBuf>,

    /// Editor behavior settings
    pub editor: EditorConfig,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Loads from a file, or returns defaults if it does not exist yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        Self::load_or_default(Self::default_path()?)
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("codepad").join("config.json"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Editor behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Named code style (`builtin`, `default`, `monokai`)
    pub code_style: String,

    /// TOML theme file; takes precedence over `code_style`
    pub theme_file: Option<PathBuf>,

    /// Quiet interval before a highlighting pass, in milliseconds
    pub highlight_delay_ms: u64,

    /// Python interpreter used for pip and running scripts
    pub python: String,
}

impl EditorConfig {
    pub fn highlight_delay(&self) -> Duration {
        Duration::from_millis(self.highlight_delay_ms)
    }

    /// Resolves the configured style mapping.
    pub fn styles(&self) -> Result<StyleMap, SyntaxError> {
        match &self.theme_file {
            Some(path) => StyleMap::load_from(path),
            None => StyleMap::named(&self.code_style),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            code_style: "default".to_string(),
            theme_file: None,
            highlight_delay_ms: 100,
            python: "python".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
