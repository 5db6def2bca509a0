//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/chrono-task/` | `~/.local/share/chrono-task/` |
//! | Config | `~/Library/Application Support/chrono-task/` | `~/.config/chrono-task/` |
//!
//! # Environment Overrides
//!
//! - `CHRONO_TASK_DATA_DIR` overrides [`data_dir`]
//! - `CHRONO_TASK_CONFIG_DIR` overrides [`config_dir`]

use std::path::{Path, PathBuf};

const APP_DIR: &str = "chrono-task";

/// File name of the task collection inside the data directory.
pub const DATA_FILE_NAME: &str = "data.json";

/// Application data root directory.
///
/// Holds `data.json` (the task collection, also the git backup working tree)
/// and the `logs/` directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHRONO_TASK_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/chrono-task-data"))
}

/// Application config directory, home of `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHRONO_TASK_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/chrono-task-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory under a data root.
#[must_use]
pub fn logs_dir(data_root: &Path) -> PathBuf {
    data_root.join("logs")
}

/// Task collection file under a data root.
#[must_use]
pub fn data_file(data_root: &Path) -> PathBuf {
    data_root.join(DATA_FILE_NAME)
}
