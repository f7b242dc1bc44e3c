//! Updater settings with JSON persistence.
//!
//! This module provides:
//! - `UpdaterSettings` with the link timeouts, chunk size and boot settle delay
//! - Persistence to a JSON file in the host's data directory
//!
//! Missing fields fall back to their defaults so older settings files keep
//! loading after new fields are added.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config;

fn default_command_timeout_ms() -> u64 {
    config::COMMAND_TIMEOUT.as_millis() as u64
}

fn default_connect_timeout_ms() -> u64 {
    config::CONNECT_TIMEOUT.as_millis() as u64
}

fn default_discovery_timeout_ms() -> u64 {
    config::DISCOVERY_TIMEOUT.as_millis() as u64
}

fn default_chunk_size() -> usize {
    config::CHUNK_SIZE
}

fn default_boot_settle_ms() -> u64 {
    config::BOOT_SETTLE_DELAY.as_millis() as u64
}

fn default_master_credential() -> String {
    config::MASTER_CREDENTIAL.to_string()
}

/// Runtime tunables for the command link and the update flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterSettings {
    /// Time to wait for the reply to a single command.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Bound on connect and disconnect.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to scan for the bootloader after a model B device reboots.
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,

    /// Firmware chunk size. Never above the link's negotiated limit.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Pause between the boot acknowledgement and the first chunk.
    #[serde(default = "default_boot_settle_ms")]
    pub boot_settle_ms: u64,

    /// Credential presented by model B firmware updates.
    #[serde(default = "default_master_credential")]
    pub master_credential: String,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            chunk_size: default_chunk_size(),
            boot_settle_ms: default_boot_settle_ms(),
            master_credential: default_master_credential(),
        }
    }
}

impl UpdaterSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn boot_settle(&self) -> Duration {
        Duration::from_millis(self.boot_settle_ms)
    }

    /// Reject values the link cannot honour.
    pub fn validate(&self) -> UpdateResult<()> {
        if self.chunk_size == 0 || self.chunk_size > config::CHUNK_SIZE {
            return Err(UpdateError::validation(format!(
                "chunk size {} must be between 1 and {}",
                self.chunk_size,
                config::CHUNK_SIZE
            )));
        }
        if self.command_timeout_ms == 0
            || self.connect_timeout_ms == 0
            || self.discovery_timeout_ms == 0
        {
            return Err(UpdateError::validation("timeouts must be non-zero"));
        }
        if self.master_credential.is_empty() {
            return Err(UpdateError::validation("master credential is empty"));
        }
        Ok(())
    }
}

/// Settings file name stored in the data directory.
const SETTINGS_FILENAME: &str = "updater_settings.json";

/// Manages persistence of updater settings to a JSON file.
pub struct SettingsManager {
    settings_file_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        let settings_file_path = data_dir.join(SETTINGS_FILENAME);
        Self { settings_file_path }
    }

    /// Load settings from disk, returning defaults if the file doesn't exist.
    pub fn load(&self) -> UpdateResult<UpdaterSettings> {
        if !self.settings_file_path.exists() {
            return Ok(UpdaterSettings::default());
        }

        let contents = fs::read_to_string(&self.settings_file_path)?;

        // Handle empty file gracefully
        if contents.trim().is_empty() {
            return Ok(UpdaterSettings::default());
        }

        let settings: UpdaterSettings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to disk.
    pub fn save(&self, settings: &UpdaterSettings) -> UpdateResult<()> {
        settings.validate()?;

        if let Some(parent) = self.settings_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(settings)?;
        fs::write(&self.settings_file_path, contents)?;

        Ok(())
    }

    /// Get the path where settings are stored.
    pub fn settings_path(&self) -> &Path {
        &self.settings_file_path
    }
}
