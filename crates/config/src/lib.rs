#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for batchwrite
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/batchwrite/config.toml)
//! - Environment variables

pub mod constants;

use batchwrite_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use constants::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WriterConfig {
    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub durability: DurabilityConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub exit_hook: ExitHookConfig,
}

/// Where staged temp files are created
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StagingLocation {
    /// The operating system temp directory
    #[default]
    System,
    /// Next to the resolved target, on the same volume
    Sibling,
}

/// Resolved staging directory choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TempLocation {
    System,
    Sibling,
    Directory(PathBuf),
}

/// Temp-file staging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagingConfig {
    #[serde(default)]
    pub location: StagingLocation,
    /// Explicit staging directory; takes precedence over `location`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(default = "default_temp_prefix")]
    pub prefix: String,
}

/// Durability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DurabilityConfig {
    /// fsync each temp file before it is renamed into place
    #[serde(default)]
    pub sync_files: bool,
    /// fsync target directories after the commit phase (unix only)
    #[serde(default)]
    pub sync_directories: bool,
}

/// Concurrency configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    #[serde(default)]
    pub max_concurrency: usize, // 0 = unbounded
}

/// Exit hook configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitHookConfig {
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            location: StagingLocation::System,
            temp_dir: None,
            prefix: default_temp_prefix(),
        }
    }
}

impl Default for ExitHookConfig {
    fn default() -> Self {
        Self {
            handle_signals: true,
        }
    }
}

fn default_temp_prefix() -> String {
    DEFAULT_TEMP_PREFIX.to_string()
}

fn default_handle_signals() -> bool {
    true
}

impl StagingConfig {
    /// Effective staging directory choice
    #[must_use]
    pub fn temp_location(&self) -> TempLocation {
        match (&self.temp_dir, self.location) {
            (Some(dir), _) => TempLocation::Directory(dir.clone()),
            (None, StagingLocation::System) => TempLocation::System,
            (None, StagingLocation::Sibling) => TempLocation::Sibling,
        }
    }
}

impl WriterConfig {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let Ok(config_path) = Self::default_path() else {
            tracing::debug!("no config directory, using default writer config");
            return Ok(Self::default());
        };

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // BATCHWRITE_STAGING
        if let Ok(staging) = std::env::var(ENV_STAGING) {
            self.staging.location = match staging.as_str() {
                "system" => StagingLocation::System,
                "sibling" => StagingLocation::Sibling,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_STAGING.to_string(),
                        value: staging,
                    }
                    .into())
                }
            };
        }

        // BATCHWRITE_TEMP_DIR
        if let Ok(dir) = std::env::var(ENV_TEMP_DIR) {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: ENV_TEMP_DIR.to_string(),
                    value: dir,
                }
                .into());
            }
            self.staging.temp_dir = Some(PathBuf::from(dir));
        }

        // BATCHWRITE_SYNC
        if let Ok(sync) = std::env::var(ENV_SYNC) {
            self.durability.sync_files = parse_bool(ENV_SYNC, sync)?;
        }

        // BATCHWRITE_MAX_CONCURRENCY
        if let Ok(limit) = std::env::var(ENV_MAX_CONCURRENCY) {
            self.concurrency.max_concurrency =
                limit.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_MAX_CONCURRENCY.to_string(),
                    value: limit,
                })?;
        }

        // BATCHWRITE_HANDLE_SIGNALS
        if let Ok(signals) = std::env::var(ENV_HANDLE_SIGNALS) {
            self.exit_hook.handle_signals = parse_bool(ENV_HANDLE_SIGNALS, signals)?;
        }

        Ok(())
    }

    /// Serialize the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializeError {
                error: e.to_string(),
            }
            .into()
        })
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
