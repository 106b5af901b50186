//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// When to use colors in terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

/// Progress display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_progress_chars")]
    pub progress_chars: String,
    #[serde(default)]
    pub color: ColorChoice,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            template: default_template(),
            progress_chars: default_progress_chars(),
            color: ColorChoice::Auto,
        }
    }
}

/// Image provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Directory images are provisioned into; platform data dir when unset
    pub store_path: Option<PathBuf>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_verify")]
    pub verify: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            chunk_size: default_chunk_size(),
            verify: default_verify(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Directory for debug log files; platform data dir when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            log_dir: None,
        }
    }
}

// Default value functions for serde
fn default_refresh_ms() -> u64 {
    100
}

fn default_template() -> String {
    "{spinner:.green} {prefix:.bold} [{wide_bar:.cyan/blue}] {percent:>3}% {msg}".to_string()
}

fn default_progress_chars() -> String {
    "#>-".to_string()
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_verify() -> bool {
    true
}

fn default_filter() -> String {
    "warn,provision=info".to_string()
}
