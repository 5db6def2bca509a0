//! Task data model: tasks, their per-date ledger, and the persisted collection.

pub mod daily_work;
pub mod shared;
pub mod task;

pub use daily_work::DailyWork;
pub use shared::SharedTask;
pub use task::{DEFAULT_RECENT_DAYS, Task, TaskStatus};

use serde::{Deserialize, Serialize};

/// The unit loaded from and saved to a [`crate::store::PersistenceStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskCollection {
    /// Tasks in display order.
    pub tasks: Vec<Task>,
}

/// Today's date in local time.
pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
