//! Enable-gated recurring job.
//!
//! [`PeriodicJob`] owns the start/stop/restart lifecycle; what runs and how
//! often comes from a [`JobAction`]. At most one loop per job exists at a
//! time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::JobSchedule;
use crate::error::Result;

/// How long [`PeriodicJob::stop`] waits for an in-flight run.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Longest wait between two ticks of a background loop.
pub const MAX_PERIOD: Duration = Duration::from_secs(366 * 24 * 3600);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Ticker whose first tick is one `period` from now, with `period` clamped
/// to `1ms..=MAX_PERIOD`. Late ticks are delayed, never bunched.
pub(crate) fn periodic_ticker(period: Duration) -> Interval {
    let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// The work a [`PeriodicJob`] repeats.
#[async_trait]
pub trait JobAction: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Current schedule. Read once per [`PeriodicJob::start`].
    fn schedule(&self) -> JobSchedule;

    /// Checked before the loop is spawned; an error keeps the job stopped.
    async fn preflight(&self) -> Result<()> {
        Ok(())
    }

    /// One cycle. Failures are handled inside.
    async fn run(&self);

    /// Runs at the beginning of every [`PeriodicJob::stop`].
    async fn on_stop(&self) {}
}

/// Outcome of [`PeriodicJob::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStart {
    Started,
    /// The schedule is disabled; the job is stopped.
    Disabled,
    AlreadyRunning,
}

struct RunningJob {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningJob {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Recurring runner for a [`JobAction`].
pub struct PeriodicJob<A: JobAction> {
    action: Arc<A>,
    grace_period: Duration,
    running: Mutex<Option<RunningJob>>,
}

impl<A: JobAction> PeriodicJob<A> {
    pub fn new(action: A) -> Self {
        Self {
            action: Arc::new(action),
            grace_period: DEFAULT_GRACE_PERIOD,
            running: Mutex::new(None),
        }
    }

    /// Override the stop grace period.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn action(&self) -> &Arc<A> {
        &self.action
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.as_ref().is_some_and(RunningJob::is_live)
    }

    /// Spawn the loop if the schedule is enabled and the preflight passes.
    /// The first run happens one period after starting.
    ///
    /// # Errors
    ///
    /// The preflight error, with the job left stopped.
    pub async fn start(&self) -> Result<JobStart> {
        let mut running = self.running.lock().await;
        self.start_locked(&mut running).await
    }

    /// Stop the loop. Safe when not running. No run starts after this returns.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        self.stop_locked(&mut running).await;
    }

    /// Stop, then start with the current schedule.
    pub async fn restart(&self) -> Result<JobStart> {
        let mut running = self.running.lock().await;
        self.stop_locked(&mut running).await;
        self.start_locked(&mut running).await
    }

    async fn start_locked(&self, running: &mut Option<RunningJob>) -> Result<JobStart> {
        let name = self.action.name();
        if running.as_ref().is_some_and(RunningJob::is_live) {
            return Ok(JobStart::AlreadyRunning);
        }
        *running = None;

        let schedule = self.action.schedule();
        if !schedule.enabled {
            debug!(job = name, "disabled, not starting");
            return Ok(JobStart::Disabled);
        }

        if let Err(e) = self.action.preflight().await {
            warn!(job = name, "not starting: {e}");
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.action),
            schedule.period(),
            cancel.clone(),
        ));
        *running = Some(RunningJob { cancel, handle });
        info!(job = name, "started, {schedule}");
        Ok(JobStart::Started)
    }

    async fn stop_locked(&self, running: &mut Option<RunningJob>) {
        self.action.on_stop().await;

        let Some(job) = running.take() else {
            return;
        };
        let name = self.action.name();
        job.cancel.cancel();

        let mut handle = job.handle;
        match tokio::time::timeout(self.grace_period, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job = name, "loop ended abnormally: {e}"),
            Err(_) => {
                warn!(
                    job = name,
                    "in-flight run exceeded {:?}, aborting", self.grace_period
                );
                handle.abort();
                let _ = handle.await;
            }
        }
        info!(job = name, "stopped");
    }
}

async fn run_loop<A: JobAction>(action: Arc<A>, period: Duration, cancel: CancellationToken) {
    let mut ticker = periodic_ticker(period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                debug!(job = action.name(), "running");
                action.run().await;
            }
        }
    }
}
