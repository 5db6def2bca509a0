//! Application wiring: settings, store, registry, timer and background jobs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tracing::{info, warn};

use crate::chrono_dirs;
use crate::config::{self, Settings, SharedSettings};
use crate::error::Result;
use crate::events::EventBus;
use crate::notify::{LogNotifier, Notifier};
use crate::registry::TaskRegistry;
use crate::scheduler::{BackupAction, BackupJob, JobStart, StatusSyncAction, StatusSyncJob};
use crate::store::{JsonFileStore, PersistenceStore};
use crate::timer::SessionTimer;
use crate::tracker::{IssueTrackerClient, JiraClient};
use crate::vcs::{GitBackend, VersionControlBackend};

/// External collaborators of the application.
pub struct Backends {
    pub store: Arc<dyn PersistenceStore>,
    pub vcs: Arc<dyn VersionControlBackend>,
    pub tracker: Arc<dyn IssueTrackerClient>,
    pub notifier: Arc<dyn Notifier>,
}

impl Backends {
    /// JSON file in the data directory, git, Jira, and log notifications.
    pub fn production(settings: &Settings) -> Self {
        Self {
            store: Arc::new(JsonFileStore::new(chrono_dirs::data_file(
                &settings.data_root(),
            ))),
            vcs: Arc::new(GitBackend::new()),
            tracker: Arc::new(JiraClient::new()),
            notifier: Arc::new(LogNotifier),
        }
    }
}

/// A running tracker instance.
pub struct App {
    settings: SharedSettings,
    config_path: PathBuf,
    events: EventBus,
    registry: TaskRegistry,
    timer: SessionTimer,
    backup: BackupJob,
    status_sync: StatusSyncJob,
}

impl App {
    /// Load settings from `config_path` (defaults when absent) and the task
    /// collection from the data directory.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let settings = Settings::load_or_default(&config_path)?;
        let backends = Backends::production(&settings);
        Self::with_backends(settings, config_path, backends)
    }

    /// Assemble an instance from explicit collaborators. Nothing is started.
    pub fn with_backends(
        settings: Settings,
        config_path: impl Into<PathBuf>,
        backends: Backends,
    ) -> Result<Self> {
        let settings = config::shared(settings);
        let events = EventBus::new();
        let registry = TaskRegistry::load(backends.store, events.clone())?;
        let timer = SessionTimer::new(events.clone());
        let backup = BackupJob::new(BackupAction::new(
            Arc::clone(&settings),
            backends.vcs,
            backends.notifier,
            events.clone(),
        ));
        let status_sync = StatusSyncJob::new(StatusSyncAction::new(
            Arc::clone(&settings),
            registry.clone(),
            backends.tracker,
        ));

        Ok(Self {
            settings,
            config_path: config_path.into(),
            events,
            registry,
            timer,
            backup,
            status_sync,
        })
    }

    /// Start autosave, the timer tick and both jobs.
    ///
    /// A job that cannot start is logged and left stopped.
    pub async fn start(&self) {
        let settings = self.settings();
        self.registry.start_autosave(settings.autosave_period());
        self.timer.start(settings.tick_period());
        log_job_start("backup", self.backup.start().await);
        log_job_start("status sync", self.status_sync.start().await);
        info!("started with {} tasks", self.registry.len());
    }

    /// Flush the timer, save, then stop both jobs (the backup job commits
    /// one last time when enabled).
    ///
    /// # Errors
    ///
    /// The final save error. The jobs are stopped regardless.
    pub async fn shutdown(&self) -> Result<()> {
        self.timer.shutdown().await;
        let saved = self.registry.shutdown().await;
        self.backup.stop().await;
        self.status_sync.stop().await;
        info!("shut down");
        saved
    }

    /// Write `settings` to the config file and restart both jobs with them.
    ///
    /// A changed data directory takes effect on the next launch.
    pub async fn save_settings(&self, settings: Settings) -> Result<()> {
        settings.save_to_file(&self.config_path)?;
        *self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;

        log_job_start("backup", self.backup.restart().await);
        log_job_start("status sync", self.status_sync.restart().await);
        Ok(())
    }

    /// Current settings.
    pub fn settings(&self) -> Settings {
        config::snapshot(&self.settings)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn backup(&self) -> &BackupJob {
        &self.backup
    }

    pub fn status_sync(&self) -> &StatusSyncJob {
        &self.status_sync
    }
}

fn log_job_start(job: &str, result: Result<JobStart>) {
    match result {
        Ok(JobStart::Started) => {}
        Ok(JobStart::Disabled) => info!("{job} is disabled"),
        Ok(JobStart::AlreadyRunning) => warn!("{job} was already running"),
        Err(e) => warn!("{job} not started: {e}"),
    }
}
