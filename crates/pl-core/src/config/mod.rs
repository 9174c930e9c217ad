//! Configuration management for panelink

mod coordinator;
mod device;
mod serde_utils;

pub use coordinator::{CoordinatorConfig, WatchdogConfig};
pub use device::{DeviceConfig, ShellCommands};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelinkConfig {
    /// The device to connect to
    pub device: DeviceConfig,
    /// Worker and watchdog behaviour
    pub coordinator: CoordinatorConfig,
}

impl PanelinkConfig {
    /// Where `config.toml` lives when no path is given:
    /// `<platform config dir>/panelink/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("panelink")
            .join("config.toml")
    }

    /// Read a config file. Keys missing from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(e) => {
                return Err(ConfigError::Invalid(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        Ok(toml::from_str(&content)?)
    }

    /// Write the whole config, creating missing parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConfigError::Invalid(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| ConfigError::Invalid(format!("cannot write {}: {}", path.display(), e)))
    }
}
