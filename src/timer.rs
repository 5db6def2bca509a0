//! Live time accrual for the active task.
//!
//! The timer never holds a whole session in memory: every tick flushes the
//! elapsed interval into the active task's ledger and restarts the interval,
//! so an ungraceful exit loses at most one tick.
//!
//! Elapsed time is read from the monotonic tokio clock, not the wall clock.
//! Changing the system time neither adds nor removes tracked time, and time
//! spent with the machine suspended is counted only as far as the platform's
//! monotonic clock counts it. It also lets tests drive the timer with a
//! paused clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{ChronoEvent, EventBus};
use crate::model::{SharedTask, today};
use crate::scheduler::periodic_ticker;

/// Reference tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Session timer. Cheaply cloneable; clones control the same session.
#[derive(Clone)]
pub struct SessionTimer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    state: Mutex<TimerState>,
    events: EventBus,
    ticker: Mutex<Option<TickLoop>>,
}

#[derive(Default)]
struct TimerState {
    active: Option<SharedTask>,
    started_at: Option<Instant>,
    paused: bool,
}

struct TickLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TimerState {
    /// Add `now - started_at` to the active task. Leaves `started_at` as is.
    fn flush(&self, now: Instant) {
        let (Some(task), Some(started_at)) = (&self.active, self.started_at) else {
            return;
        };
        let elapsed = now.saturating_duration_since(started_at);
        if elapsed.is_zero() {
            return;
        }
        let delta = match TimeDelta::from_std(elapsed) {
            Ok(delta) => delta,
            Err(e) => {
                warn!("elapsed interval out of range: {e}");
                return;
            }
        };
        if let Err(e) = task.add_duration(today(), delta) {
            warn!(id = task.id(), "failed to record elapsed time: {e}");
        }
    }
}

impl std::fmt::Debug for SessionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SessionTimer")
            .field("active", &state.active.as_ref().map(SharedTask::id))
            .field("paused", &state.paused)
            .finish_non_exhaustive()
    }
}

impl SessionTimer {
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState::default()),
                events,
                ticker: Mutex::new(None),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The task currently accruing time (or paused on).
    pub fn active_task(&self) -> Option<SharedTask> {
        self.state().active.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// Switch the timed task. `None` returns to idle.
    ///
    /// The previous task keeps the time accrued up to now. Switching always
    /// clears the paused flag.
    pub fn set_active(&self, task: Option<SharedTask>) {
        let now = Instant::now();
        let mut state = self.state();
        if state.active == task {
            return;
        }

        state.flush(now);
        let was_paused = state.paused;
        state.active = task;
        state.paused = false;
        state.started_at = state.active.is_some().then_some(now);
        let id = state.active.as_ref().map(|t| t.id().to_owned());
        drop(state);

        debug!(?id, "active task changed");
        self.inner
            .events
            .emit(ChronoEvent::ActiveTaskChanged { id });
        if was_paused {
            self.inner
                .events
                .emit(ChronoEvent::PausedChanged { paused: false });
        }
    }

    /// Stop accruing but keep the active task.
    pub fn pause(&self) {
        let now = Instant::now();
        let mut state = self.state();
        state.flush(now);
        state.started_at = None;
        let changed = !state.paused;
        state.paused = true;
        drop(state);

        if changed {
            self.inner
                .events
                .emit(ChronoEvent::PausedChanged { paused: true });
        }
    }

    /// Continue accruing on the active task. No-op unless paused.
    pub fn resume(&self) {
        let now = Instant::now();
        let mut state = self.state();
        if !state.paused {
            return;
        }
        state.paused = false;
        if state.active.is_some() {
            state.started_at = Some(now);
        }
        drop(state);

        self.inner
            .events
            .emit(ChronoEvent::PausedChanged { paused: false });
    }

    /// Flush the running interval into the active task and restart it.
    pub fn tick(&self) {
        let now = Instant::now();
        let mut state = self.state();
        if state.paused || state.started_at.is_none() {
            return;
        }
        state.flush(now);
        state.started_at = Some(now);
    }

    /// Tick every `every` in the background. No-op while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, every: Duration) {
        let mut slot = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|l| !l.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            Arc::downgrade(&self.inner),
            every,
            cancel.clone(),
        ));
        *slot = Some(TickLoop { cancel, handle });
        info!("session timer ticking every {every:?}");
    }

    /// Stop ticking and flush the running interval. The active task and the
    /// paused flag are left as they are.
    pub async fn shutdown(&self) {
        let running = self
            .inner
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!("timer loop ended abnormally: {e}");
            }
        }

        let now = Instant::now();
        let mut state = self.state();
        state.flush(now);
        state.started_at = None;
    }
}

async fn tick_loop(timer: Weak<TimerInner>, every: Duration, cancel: CancellationToken) {
    let mut ticker = periodic_ticker(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = timer.upgrade() else {
                    break;
                };
                SessionTimer { inner }.tick();
            }
        }
    }
    debug!("timer loop stopped");
}
