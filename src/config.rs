//! Configuration for the audio session
//!
//! Session settings can be loaded from a JSON file. Every field has a
//! default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Log file name used when none is configured, relative to the working directory
pub const DEFAULT_LOG_PATH: &str = "audio_manager_debug.log";

/// Audio session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Diagnostic log file path
    pub log_path: PathBuf,
    /// Append to an existing log instead of truncating it
    pub append_log: bool,
    /// Most verbose level written to the log ("error" .. "trace")
    pub log_level: String,
    /// Output device to open; `None` selects the default device
    pub device_name: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            append_log: false,
            log_level: "debug".to_string(),
            device_name: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Parsed `log_level`, falling back to DEBUG for unknown names
    pub fn max_log_level(&self) -> tracing::Level {
        tracing::Level::from_str(&self.log_level).unwrap_or_else(|_| {
            log::warn!(
                "[Config] Unknown log level '{}'. Using debug.",
                self.log_level
            );
            tracing::Level::DEBUG
        })
    }
}
