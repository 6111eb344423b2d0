use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "repo-bootstrap";

/// Get the XDG config directory for repo-bootstrap
///
/// Returns `$XDG_CONFIG_HOME/repo-bootstrap` or `~/.config/repo-bootstrap` if not set
pub fn config_dir() -> Result<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => home_dir()?.join(".config"),
    };

    Ok(base.join(APP_DIR))
}

/// Get the home directory
pub fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .context("Failed to get home directory")
        .map(|bd| bd.home_dir().to_path_buf())
}
