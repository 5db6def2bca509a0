//! User-facing notifications.

use std::sync::{Mutex, PoisonError};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Surfaces a message to the user (tray balloon, toast, log line).
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str, level: NotifyLevel);
}

/// Routes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info => tracing::info!(title, "{message}"),
            NotifyLevel::Warning => tracing::warn!(title, "{message}"),
            NotifyLevel::Error => tracing::error!(title, "{message}"),
        }
    }
}

/// Records notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<(String, String, NotifyLevel)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far as `(title, message, level)`.
    pub fn notifications(&self) -> Vec<(String, String, NotifyLevel)> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str, level: NotifyLevel) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((title.to_owned(), message.to_owned(), level));
    }
}
