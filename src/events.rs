//! State-change notifications for presentation layers.
//!
//! Events are lightweight (ids, flags, short strings). Subscribers read the
//! full state back through the getters on the emitting component.

use chrono::{DateTime, Local};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Something observable changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChronoEvent {
    /// Tasks were added, removed or reordered.
    TasksChanged,
    /// A single task's fields changed.
    TaskUpdated { id: String },
    /// The timed task changed (`None` = idle).
    ActiveTaskChanged { id: Option<String> },
    /// The timer was paused or resumed.
    PausedChanged { paused: bool },
    /// A status sync cycle started or finished.
    SyncInFlight { active: bool },
    /// A backup commit was made.
    BackupCompleted { message: String },
    /// The task collection was saved.
    Saved { at: DateTime<Local> },
}

/// Broadcast fan-out of [`ChronoEvent`]s. Clones share subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChronoEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChronoEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is fine.
    pub fn emit(&self, event: ChronoEvent) {
        let _ = self.tx.send(event);
    }
}
