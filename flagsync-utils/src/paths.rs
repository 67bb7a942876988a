//! Path utilities for flagsync
//!
//! Handles XDG Base Directory specification compliance for config,
//! state, and data directories.

use std::path::{Path, PathBuf};
use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "flagsync";

/// Get project directories (cached)
fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/flagsync` or `~/.config/flagsync`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the main configuration file path
///
/// Location: `$XDG_CONFIG_HOME/flagsync/config.toml`
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Get the flag values file read by the file-backed provider
///
/// Location: `$XDG_CONFIG_HOME/flagsync/flags.toml`
pub fn flags_file() -> PathBuf {
    config_dir().join("flags.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/flagsync` or `~/.local/state/flagsync`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the data directory (persisted targeting context)
///
/// Location: `$XDG_DATA_HOME/flagsync` or `~/.local/share/flagsync`
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(fallback_data_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/flagsync/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Get the persisted user context path
///
/// Location: `$XDG_DATA_HOME/flagsync/user-context.json`
pub fn user_context_file() -> PathBuf {
    data_dir().join("user-context.json")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}

fn fallback_data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join(APP_NAME)
}
