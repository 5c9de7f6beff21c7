//! CLI command implementations.

pub mod config;
pub mod diff;
pub mod export;
pub mod map;
pub mod run;
pub mod stats;

use anyhow::{Context, Result};
use pagewise_config::{AppPaths, Config};
use std::path::PathBuf;

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// The config file in use: the explicit one, or the platform default.
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(expand_path(path)),
        None => AppPaths::new()
            .map(|paths| paths.config_file)
            .context("Failed to determine application directories"),
    }
}

/// Load configuration, falling back to defaults when the file is missing.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let path = config_file(explicit)?;
    Config::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
