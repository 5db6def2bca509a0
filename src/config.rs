//! User settings.
//!
//! Settings live in a TOML file (see [`crate::chrono_dirs::config_file`]).
//! Every section is `#[serde(default)]` so a partial file loads cleanly.
//! Background jobs read the settings when they start; a change only takes
//! effect after the job is restarted.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::tracker::TrackerCredentials;

/// Settings shared between the application and its background jobs.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Wrap settings for sharing.
pub fn shared(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Clone the current settings out of the shared handle.
pub fn snapshot(settings: &SharedSettings) -> Settings {
    settings
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where and how often the task collection is saved.
    pub storage: StorageConfig,
    /// Timer cadence.
    pub timer: TimerConfig,
    /// Issue tracker credentials.
    pub tracker: TrackerConfig,
    /// Git backup of the data directory.
    pub backup: JobSchedule,
    /// Periodic refresh of linked issue statuses.
    pub status_sync: JobSchedule,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            timer: TimerConfig::default(),
            tracker: TrackerConfig::default(),
            backup: JobSchedule {
                enabled: false,
                interval: 1,
                unit: TimeUnit::Hours,
            },
            status_sync: JobSchedule {
                enabled: false,
                interval: 15,
                unit: TimeUnit::Minutes,
            },
        }
    }
}

/// Storage location and autosave cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory (None = platform default).
    pub data_dir: Option<PathBuf>,
    /// Seconds between automatic saves.
    pub autosave_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            autosave_secs: crate::registry::DEFAULT_AUTOSAVE_INTERVAL.as_secs(),
        }
    }
}

/// Session timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Milliseconds between flushes of elapsed time into the active task.
    ///
    /// Bounds how much tracked time a crash can lose.
    pub tick_millis: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_millis: crate::timer::DEFAULT_TICK_INTERVAL.as_millis() as u64,
        }
    }
}

/// Issue tracker account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Account email used for basic auth.
    pub email: String,
    /// API token used for basic auth. Stored in plain text.
    pub api_token: String,
}

impl TrackerConfig {
    /// Credentials, or `None` when either field is blank.
    pub fn credentials(&self) -> Option<TrackerCredentials> {
        if self.email.trim().is_empty() || self.api_token.trim().is_empty() {
            return None;
        }
        Some(TrackerCredentials {
            email: self.email.clone(),
            api_token: self.api_token.clone(),
        })
    }
}

/// Unit for [`JobSchedule::interval`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    #[default]
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    fn secs(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3600,
            Self::Days => 86_400,
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}

/// Enable flag and cadence of a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSchedule {
    /// Whether the job runs at all.
    pub enabled: bool,
    /// Number of `unit`s between runs. Values below 1 run as 1.
    pub interval: u64,
    /// Unit of `interval`.
    pub unit: TimeUnit,
}

impl Default for JobSchedule {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 1,
            unit: TimeUnit::Hours,
        }
    }
}

impl JobSchedule {
    /// Time between two runs.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval.max(1).saturating_mul(self.unit.secs()))
    }
}

impl std::fmt::Display for JobSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.enabled {
            write!(f, "every {} {}", self.interval.max(1), self.unit)
        } else {
            write!(f, "disabled")
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChronoError::Config(e.to_string()))
    }

    /// Load settings from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Save settings to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the settings cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChronoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default settings path.
    pub fn default_config_path() -> PathBuf {
        crate::chrono_dirs::config_file()
    }

    /// Resolved data directory.
    pub fn data_root(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => crate::chrono_dirs::data_dir(),
        }
    }

    /// Autosave cadence.
    pub fn autosave_period(&self) -> Duration {
        Duration::from_secs(self.storage.autosave_secs.max(1))
    }

    /// Timer tick cadence.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.timer.tick_millis.max(1))
    }
}
