//! Shared, lock-protected task handle.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, TimeDelta};

use super::task::{Task, TaskStatus};
use crate::error::Result;

/// A task shared between the registry, the timer and the background jobs.
///
/// Every field update happens under the task's own write lock, so readers
/// (display, persistence snapshots) never see a half-applied change.
/// Clones refer to the same task.
#[derive(Debug, Clone)]
pub struct SharedTask {
    id: Arc<str>,
    inner: Arc<RwLock<Task>>,
}

impl SharedTask {
    pub fn new(task: Task) -> Self {
        Self {
            id: Arc::from(task.id()),
            inner: Arc::new(RwLock::new(task)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read access to the task.
    pub fn read(&self) -> RwLockReadGuard<'_, Task> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Task> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Owned copy of the current task state.
    pub fn snapshot(&self) -> Task {
        self.read().clone()
    }

    pub fn description(&self) -> String {
        self.read().description().to_owned()
    }

    pub fn status(&self) -> TaskStatus {
        self.read().status()
    }

    pub fn set_status(&self, status: TaskStatus) {
        self.write().set_status(status);
    }

    pub fn add_duration(&self, date: NaiveDate, delta: TimeDelta) -> Result<()> {
        self.write().add_duration(date, delta)
    }

    pub fn set_duration(&self, date: NaiveDate, value: TimeDelta) -> Result<()> {
        self.write().set_duration(date, value)
    }

    pub fn set_note(&self, date: NaiveDate, text: impl Into<String>) {
        self.write().set_note(date, text);
    }

    pub fn set_notes(&self, notes: impl Into<String>) {
        self.write().set_notes(notes);
    }

    pub fn add_tag(&self, tag: impl Into<String>) -> bool {
        self.write().add_tag(tag)
    }

    pub fn remove_tag(&self, tag: &str) -> bool {
        self.write().remove_tag(tag)
    }

    /// Whether both handles point at the same task.
    pub fn same_task(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for SharedTask {
    fn eq(&self, other: &Self) -> bool {
        self.same_task(other)
    }
}

impl Eq for SharedTask {}
