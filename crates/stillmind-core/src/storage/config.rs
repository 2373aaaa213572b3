//! TOML-based sync engine configuration.
//!
//! Stores the tunables of the sync engine:
//! - Remote document store endpoint
//! - Lookback window for unsynced-session detection
//! - Periodic background sync cadence
//!
//! Configuration is stored at `~/.config/stillmind/config.toml` and is
//! owned by the composition root, which passes it into each component
//! explicitly. There is no global preference state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Sync engine configuration.
///
/// Serialized to/from TOML at `~/.config/stillmind/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote document store.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    /// Lookback window (days) when detecting unsynced local sessions.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Interval between periodic background syncs, in minutes.
    #[serde(default = "default_sync_interval_min")]
    pub sync_interval_min: u64,
    /// Flexible slack added to the periodic interval, in minutes.
    #[serde(default = "default_sync_slack_min")]
    pub sync_slack_min: u64,
}

fn default_remote_url() -> String {
    "https://api.stillmind.app/v1".to_string()
}
fn default_lookback_days() -> u32 {
    30
}
fn default_sync_interval_min() -> u64 {
    120
}
fn default_sync_slack_min() -> u64 {
    15
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            lookback_days: default_lookback_days(),
            sync_interval_min: default_sync_interval_min(),
            sync_slack_min: default_sync_slack_min(),
        }
    }
}

impl SyncConfig {
    fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/stillmind"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load configuration from disk, falling back to defaults when the
    /// file does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Lookback window expressed in milliseconds.
    pub fn lookback_millis(&self) -> i64 {
        i64::from(self.lookback_days) * 24 * 60 * 60 * 1000
    }
}
