//! Background jobs.
//!
//! [`PeriodicJob`] is the shared start/stop/restart lifecycle; the backup and
//! status-sync jobs plug their work in through [`JobAction`].

pub mod backup;
pub mod job;
pub mod status_sync;

pub use backup::{BackupAction, BackupJob};
pub use job::{DEFAULT_GRACE_PERIOD, JobAction, JobStart, MAX_PERIOD, PeriodicJob};
pub(crate) use job::periodic_ticker;
pub use status_sync::{StatusSyncAction, StatusSyncJob};
