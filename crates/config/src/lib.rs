#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for provision
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/provision/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod sections;

pub use sections::{ColorChoice, DisplayConfig, LoggingConfig, ProvisionConfig};

use provision_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub provision: ProvisionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("provision").join("config.toml"))
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

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// If path is provided, loads from that file.
    /// If path is None, uses the default loading behavior.
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

    /// Write the configuration as TOML, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the
    /// file cannot be written.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), Error> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            error: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }

        fs::write(path, contents)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PROVISION_STORE
        if let Ok(store) = std::env::var("PROVISION_STORE") {
            self.provision.store_path = Some(PathBuf::from(store));
        }

        // PROVISION_CHUNK_SIZE
        if let Ok(chunk_size) = std::env::var("PROVISION_CHUNK_SIZE") {
            self.provision.chunk_size =
                chunk_size.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PROVISION_CHUNK_SIZE".to_string(),
                    value: chunk_size,
                })?;
        }

        // PROVISION_VERIFY
        if let Ok(verify) = std::env::var("PROVISION_VERIFY") {
            self.provision.verify = match verify.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PROVISION_VERIFY".to_string(),
                        value: verify,
                    }
                    .into())
                }
            };
        }

        // PROVISION_REFRESH_MS
        if let Ok(refresh) = std::env::var("PROVISION_REFRESH_MS") {
            self.display.refresh_ms = refresh.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PROVISION_REFRESH_MS".to_string(),
                value: refresh,
            })?;
        }

        // PROVISION_COLOR
        if let Ok(color) = std::env::var("PROVISION_COLOR") {
            self.display.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PROVISION_COLOR".to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        // PROVISION_LOG
        if let Ok(filter) = std::env::var("PROVISION_LOG") {
            self.logging.filter = filter;
        }

        Ok(())
    }

    /// Reject values that would make the tools misbehave
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.provision.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "provision.chunk_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.display.refresh_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "display.refresh_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Get the image store path (with default)
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.provision
            .store_path
            .clone()
            .unwrap_or_else(|| data_dir().join("images"))
    }

    /// Get the log directory (with default)
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .log_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("logs"))
    }

    /// Interval between renders of the progress display
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.display.refresh_ms)
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("provision")
}
