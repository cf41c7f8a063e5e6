pub mod persist;

pub use pf_core::config::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config path is given.
const DEFAULT_PATHS: &[&str] = &["./pixforge.toml", "~/.config/pixforge/config.toml"];

/// Where `set-output` writes when no config file exists yet.
const DEFAULT_WRITE_PATH: &str = "~/.config/pixforge/config.toml";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {warning}", path.display());
    }

    Ok(config)
}

/// First existing config file: the custom path if given, else a default location.
pub fn find_config_file(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    match find_config_file(custom_path) {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            load_config(&path)
        }
        None => {
            tracing::debug!("No config file found; using defaults");
            Ok(Config::default())
        }
    }
}

/// Config file that persistence should write to.
pub fn config_path_for_write(custom_path: Option<&Path>) -> PathBuf {
    find_config_file(custom_path)
        .unwrap_or_else(|| PathBuf::from(shellexpand::tilde(DEFAULT_WRITE_PATH).as_ref()))
}
