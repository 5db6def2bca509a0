//! Periodic version-control snapshot of the data directory.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::config::{JobSchedule, SharedSettings, snapshot};
use crate::error::{ChronoError, Result};
use crate::events::{ChronoEvent, EventBus};
use crate::notify::{Notifier, NotifyLevel};
use crate::scheduler::job::{JobAction, JobStart, PeriodicJob};
use crate::vcs::{CommitOutcome, VersionControlBackend};

const ERROR_TITLE: &str = "Git Backup Error";
const UNAVAILABLE_MESSAGE: &str = "Git is not installed. Automated backups are disabled.";

/// Commits the data directory on every run.
pub struct BackupAction {
    settings: SharedSettings,
    backend: Arc<dyn VersionControlBackend>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    last_message: std::sync::Mutex<Option<String>>,
    commit_lock: tokio::sync::Mutex<()>,
}

impl BackupAction {
    pub fn new(
        settings: SharedSettings,
        backend: Arc<dyn VersionControlBackend>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
    ) -> Self {
        Self {
            settings,
            backend,
            notifier,
            events,
            last_message: std::sync::Mutex::new(None),
            commit_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn data_dir(&self) -> PathBuf {
        snapshot(&self.settings).data_root()
    }

    async fn is_available(&self) -> bool {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.is_available())
            .await
            .unwrap_or(false)
    }

    async fn ensure_repository(&self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let dir = self.data_dir();
        tokio::task::spawn_blocking(move || backend.ensure_repository(&dir))
            .await
            .map_err(|e| ChronoError::Backup(e.to_string()))?
    }

    /// Ensure the repository, then commit everything in the data directory.
    pub async fn backup(&self) -> Result<CommitOutcome> {
        let _guard = self.commit_lock.lock().await;

        let backend = Arc::clone(&self.backend);
        let dir = self.data_dir();
        let message = format!(
            "Backup {}",
            Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S")
        );

        let outcome = tokio::task::spawn_blocking(move || {
            backend.ensure_repository(&dir)?;
            backend.commit_all(&dir, &message)
        })
        .await
        .map_err(|e| ChronoError::Backup(e.to_string()))??;

        match &outcome {
            CommitOutcome::Committed(message) => {
                info!("backup committed: {message}");
                *self
                    .last_message
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
                self.events.emit(ChronoEvent::BackupCompleted {
                    message: message.clone(),
                });
            }
            CommitOutcome::NothingToCommit => debug!("backup skipped, no changes"),
        }
        Ok(outcome)
    }

    /// Message of the newest backup commit.
    pub async fn last_message(&self) -> Option<String> {
        let cached = self
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if cached.is_some() {
            return cached;
        }

        let backend = Arc::clone(&self.backend);
        let dir = self.data_dir();
        let stored = tokio::task::spawn_blocking(move || backend.last_commit_message(&dir))
            .await
            .ok()
            .and_then(|r| r.ok())
            .flatten();
        if let Some(message) = &stored {
            *self
                .last_message
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
        }
        stored
    }
}

#[async_trait]
impl JobAction for BackupAction {
    fn name(&self) -> &str {
        "backup"
    }

    fn schedule(&self) -> JobSchedule {
        snapshot(&self.settings).backup
    }

    async fn preflight(&self) -> Result<()> {
        if !self.is_available().await {
            self.notifier
                .notify(ERROR_TITLE, UNAVAILABLE_MESSAGE, NotifyLevel::Error);
            return Err(ChronoError::BackendUnavailable(
                "git is not installed".to_owned(),
            ));
        }
        if let Err(e) = self.ensure_repository().await {
            warn!("cannot initialize backup repository: {e}");
        }
        Ok(())
    }

    async fn run(&self) {
        if let Err(e) = self.backup().await {
            warn!("backup failed: {e}");
        }
    }

    async fn on_stop(&self) {
        if !self.schedule().enabled || !self.is_available().await {
            return;
        }
        debug!("final backup before stopping");
        self.run().await;
    }
}

/// Scheduled backups of the data directory.
pub struct BackupJob {
    job: PeriodicJob<BackupAction>,
}

impl BackupJob {
    pub fn new(action: BackupAction) -> Self {
        Self {
            job: PeriodicJob::new(action),
        }
    }

    pub async fn start(&self) -> Result<JobStart> {
        self.job.start().await
    }

    /// Runs one final backup when enabled, then stops.
    pub async fn stop(&self) {
        self.job.stop().await;
    }

    pub async fn restart(&self) -> Result<JobStart> {
        self.job.restart().await
    }

    pub async fn is_running(&self) -> bool {
        self.job.is_running().await
    }

    /// Back up right away, independent of the schedule.
    pub async fn backup_now(&self) -> Result<CommitOutcome> {
        self.job.action().backup().await
    }

    pub async fn last_backup_message(&self) -> Option<String> {
        self.job.action().last_message().await
    }
}
