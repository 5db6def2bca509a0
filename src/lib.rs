//! chrono-task: personal task and time tracking engine.
//!
//! Tracks elapsed time per task per day, keeps notes and tags, and in the
//! background saves the task list, commits the data directory to git, and
//! refreshes task statuses from Jira.
//!
//! # Architecture
//!
//! - **Model**: [`Task`] with a per-date ledger of [`DailyWork`]
//! - **Registry**: the ordered [`TaskRegistry`] with uniqueness rules and autosave
//! - **Timer**: [`SessionTimer`] flushes elapsed time into the active task every tick
//! - **Jobs**: [`scheduler::PeriodicJob`] drives the backup and status-sync jobs
//! - **Backends**: [`store`], [`vcs`] and [`tracker`] behind traits
//!
//! [`App`] wires everything together from a [`Settings`] file.

pub mod app;
pub mod chrono_dirs;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod notify;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod timer;
pub mod tracker;
pub mod vcs;

pub use app::{App, Backends};
pub use config::{JobSchedule, Settings, TimeUnit};
pub use error::{ChronoError, Result};
pub use events::{ChronoEvent, EventBus};
pub use model::{DailyWork, SharedTask, Task, TaskCollection, TaskStatus};
pub use registry::TaskRegistry;
pub use timer::SessionTimer;
