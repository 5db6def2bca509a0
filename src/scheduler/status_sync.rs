//! Periodic refresh of task statuses from the issue tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{JobSchedule, SharedSettings, snapshot};
use crate::error::Result;
use crate::events::ChronoEvent;
use crate::model::SharedTask;
use crate::registry::TaskRegistry;
use crate::scheduler::job::{JobAction, JobStart, PeriodicJob};
use crate::tracker::{IssueSnapshot, IssueTrackerClient, TrackerCredentials};

/// Fetches every linked, open task's issue and adopts its status.
pub struct StatusSyncAction {
    settings: SharedSettings,
    registry: TaskRegistry,
    client: Arc<dyn IssueTrackerClient>,
    in_flight: AtomicUsize,
}

/// Marks fetches as in flight for as long as it lives.
struct InFlight<'a> {
    action: &'a StatusSyncAction,
}

impl<'a> InFlight<'a> {
    fn enter(action: &'a StatusSyncAction) -> Self {
        if action.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            action
                .registry
                .events()
                .emit(ChronoEvent::SyncInFlight { active: true });
        }
        Self { action }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.action.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.action
                .registry
                .events()
                .emit(ChronoEvent::SyncInFlight { active: false });
        }
    }
}

impl StatusSyncAction {
    pub fn new(
        settings: SharedSettings,
        registry: TaskRegistry,
        client: Arc<dyn IssueTrackerClient>,
    ) -> Self {
        Self {
            settings,
            registry,
            client,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn credentials(&self) -> Option<TrackerCredentials> {
        snapshot(&self.settings).tracker.credentials()
    }

    /// Linked tasks whose status is not terminal, with their URLs.
    fn open_linked_tasks(&self) -> Vec<(SharedTask, String)> {
        self.registry
            .tasks()
            .into_iter()
            .filter_map(|task| {
                let url = {
                    let t = task.read();
                    if t.status().is_terminal() {
                        return None;
                    }
                    t.tracker_url()
                        .map(str::trim)
                        .filter(|u| !u.is_empty())?
                        .to_owned()
                };
                Some((task, url))
            })
            .collect()
    }

    /// Write the issue's status to the task when it differs.
    fn apply(&self, task: &SharedTask, issue: &IssueSnapshot) -> bool {
        let status = issue.task_status();
        if task.status() == status {
            return false;
        }
        info!(key = %issue.key, %status, "status updated from tracker");
        self.registry.update(task, |t| t.set_status(status));
        true
    }

    /// Run one refresh cycle. Returns the number of tasks whose status changed.
    pub async fn refresh(&self) -> usize {
        let Some(credentials) = self.credentials() else {
            debug!("tracker credentials not set, skipping status refresh");
            return 0;
        };

        let targets = self.open_linked_tasks();
        if targets.is_empty() {
            return 0;
        }

        let _in_flight = InFlight::enter(self);
        let fetches = targets.iter().map(|(task, url)| {
            let credentials = &credentials;
            async move { (task, self.client.fetch_issue(url, credentials).await) }
        });

        let mut updated = 0;
        for (task, fetched) in join_all(fetches).await {
            match fetched {
                Ok(issue) => {
                    if self.apply(task, &issue) {
                        updated += 1;
                    }
                }
                Err(e) => warn!(id = task.id(), "status refresh failed: {e}"),
            }
        }
        debug!("status refresh done, {updated} of {} changed", targets.len());
        updated
    }

    /// Link `task` to `url`, then fetch the issue once to adopt its status.
    ///
    /// Returns `None` when no credentials are configured; the link is kept.
    ///
    /// # Errors
    ///
    /// Registry validation errors, or the fetch error (the link is kept).
    pub async fn link_issue(&self, task: &SharedTask, url: &str) -> Result<Option<IssueSnapshot>> {
        self.registry.set_tracker_url(task, Some(url.to_owned()))?;

        let Some(credentials) = self.credentials() else {
            return Ok(None);
        };
        let issue = {
            let _in_flight = InFlight::enter(self);
            self.client.fetch_issue(url, &credentials).await?
        };
        self.apply(task, &issue);
        Ok(Some(issue))
    }
}

#[async_trait]
impl JobAction for StatusSyncAction {
    fn name(&self) -> &str {
        "status-sync"
    }

    fn schedule(&self) -> JobSchedule {
        snapshot(&self.settings).status_sync
    }

    async fn run(&self) {
        self.refresh().await;
    }
}

/// Scheduled status refresh of linked tasks.
pub struct StatusSyncJob {
    job: PeriodicJob<StatusSyncAction>,
}

impl StatusSyncJob {
    pub fn new(action: StatusSyncAction) -> Self {
        Self {
            job: PeriodicJob::new(action),
        }
    }

    pub async fn start(&self) -> Result<JobStart> {
        self.job.start().await
    }

    pub async fn stop(&self) {
        self.job.stop().await;
    }

    pub async fn restart(&self) -> Result<JobStart> {
        self.job.restart().await
    }

    pub async fn is_running(&self) -> bool {
        self.job.is_running().await
    }

    /// Whether fetches are in flight right now.
    pub fn is_refreshing(&self) -> bool {
        self.job.action().is_refreshing()
    }

    /// Refresh immediately, independent of the schedule.
    pub async fn refresh_now(&self) -> usize {
        self.job.action().refresh().await
    }

    pub async fn link_issue(&self, task: &SharedTask, url: &str) -> Result<Option<IssueSnapshot>> {
        self.job.action().link_issue(task, url).await
    }
}
