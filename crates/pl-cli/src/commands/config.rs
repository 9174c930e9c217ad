//! Config command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use pl_core::config::PanelinkConfig;
use pl_core::ConfigError;

use crate::output::{print_error, print_info, print_success, print_warning};

fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(PanelinkConfig::default_path)
}

/// Load the config file, falling back to defaults when the default file
/// does not exist. An explicitly given path must exist.
pub fn load_or_default(config_path: Option<&Path>) -> Result<PanelinkConfig> {
    let path = resolve_path(config_path);
    match PanelinkConfig::load(&path) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(ConfigError::NotFound(_)) if config_path.is_none() => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(PanelinkConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", path.display())),
    }
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {}", path.display()));
        print_info("Run 'panelink config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {}", path.display()));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    println!("{}", content);

    Ok(())
}

/// Write a default configuration file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {}", path.display()));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    PanelinkConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    print_success(&format!("Created configuration file: {}", path.display()));
    print_info("Set device.address before connecting");
    Ok(())
}

/// Print the config file path
pub fn config_path(config_path: Option<&Path>) -> Result<()> {
    println!("{}", resolve_path(config_path).display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_or_default(Some(&missing)).is_err());
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config_init(Some(&path), false).unwrap();
        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.device.framebuffer_port, 5900);
        assert!(!config.coordinator.watchdog.heartbeat);
    }

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[device]\naddress = \"10.0.0.9\"\n").unwrap();

        config_init(Some(&path), false).unwrap();
        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.device.address, "10.0.0.9");

        config_init(Some(&path), true).unwrap();
        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config.device.address, "");
    }
}
