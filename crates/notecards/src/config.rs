//! Configuration management for notecards.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dictation::RecognitionOptions;
use crate::error::{Error, Result};
use crate::storage::{validate_key, DEFAULT_NOTES_KEY};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "notecards";

/// Default database file name (`sqlite` backend).
const DATABASE_FILE_NAME: &str = "notes.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "NOTECARDS_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NOTECARDS_`, sections split on `__`)
/// 2. TOML config file at `~/.config/notecards/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Dictation configuration.
    pub dictation: DictationConfig,
}

/// Which key/value backend holds the notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key.
    #[default]
    File,
    /// A `SQLite` database.
    Sqlite,
    /// Nothing is written to disk.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend holding the notes.
    pub backend: StorageBackend,
    /// Directory for note data.
    /// Defaults to `~/.local/share/notecards`
    pub data_dir: Option<PathBuf>,
    /// Key under which the note collection is stored.
    pub key: String,
}

/// Dictation-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Spoken language tag passed to the recognizer.
    pub language: String,
    /// Keep listening across pauses.
    pub continuous: bool,
    /// Deliver interim (not yet final) results.
    pub interim_results: bool,
    /// Alternatives requested per result.
    pub max_alternatives: u32,
    /// External speech-to-text program. Dictation is unsupported when unset.
    pub command: Option<String>,
    /// Arguments for `command`.
    pub args: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: None, // Will be resolved to default at runtime
            key: DEFAULT_NOTES_KEY.to_string(),
        }
    }
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            language: "pt-BR".to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
            command: None,
            args: Vec::new(),
        }
    }
}

impl DictationConfig {
    /// Session options derived from this configuration.
    #[must_use]
    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions {
            language: self.language.clone(),
            continuous: self.continuous,
            interim_results: self.interim_results,
            max_alternatives: self.max_alternatives,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "storage.key must not be empty".to_string(),
            });
        }

        if validate_key(&self.storage.key).is_err() {
            return Err(Error::ConfigValidation {
                message: "storage.key must not start with '.' or contain path separators"
                    .to_string(),
            });
        }

        if self.dictation.language.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "dictation.language must not be empty".to_string(),
            });
        }

        if self.dictation.max_alternatives == 0 {
            return Err(Error::ConfigValidation {
                message: "dictation.max_alternatives must be at least 1".to_string(),
            });
        }

        match &self.dictation.command {
            Some(command) if command.trim().is_empty() => {
                return Err(Error::ConfigValidation {
                    message: "dictation.command must not be empty when set".to_string(),
                });
            }
            None if !self.dictation.args.is_empty() => {
                return Err(Error::ConfigValidation {
                    message: "dictation.args requires dictation.command".to_string(),
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Get the data directory, resolving defaults if not set.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the database path used by the `sqlite` backend.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join(DATABASE_FILE_NAME)
    }
}
