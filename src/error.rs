//! Error types for the task tracker.

/// Top-level error type for task tracking, persistence, and background jobs.
#[derive(Debug, thiserror::Error)]
pub enum ChronoError {
    /// Another task already uses this description.
    #[error("task with description '{0}' already exists")]
    DuplicateDescription(String),

    /// Another task already links this tracker URL.
    #[error("task with tracker URL '{0}' already exists")]
    DuplicateTrackerUrl(String),

    /// A duration passed to the ledger was negative.
    #[error("duration must not be negative")]
    NegativeDuration,

    /// Task descriptions must contain at least one non-whitespace character.
    #[error("task description must not be empty")]
    EmptyDescription,

    /// The task is not part of the registry.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// Loading or saving the task collection failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The version-control tool is missing.
    #[error("version control backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A version-control command failed.
    #[error("backup error: {0}")]
    Backup(String),

    /// The URL does not point at a tracker issue.
    #[error("not a tracker issue URL: {0}")]
    InvalidTrackerUrl(String),

    /// The issue tracker request failed.
    #[error("tracker fetch error: {0}")]
    TrackerFetch(String),

    /// Settings could not be read or written.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChronoError {
    /// Returns `true` for errors raised by input validation.
    ///
    /// Validation errors are rejected before any state changes.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateDescription(_)
                | Self::DuplicateTrackerUrl(_)
                | Self::NegativeDuration
                | Self::EmptyDescription
                | Self::UnknownTask(_)
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChronoError>;
