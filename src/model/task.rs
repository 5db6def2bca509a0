//! Task entity and its per-date ledger.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use super::daily_work::DailyWork;
use super::today;
use crate::error::{ChronoError, Result};

/// Window used by [`Task::duration_recent`].
pub const DEFAULT_RECENT_DAYS: u32 = 30;

/// Workflow status of a task, usually mirrored from the issue tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Waiting for validation.
    Validation,
    /// Finished.
    Done,
    /// The tracker reported a status with no local equivalent.
    Unknown,
    /// Status tracking is switched off for this task.
    None,
}

impl TaskStatus {
    /// Statuses the status sync never refreshes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::None)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Todo => "To do",
            Self::InProgress => "In progress",
            Self::Validation => "Validation",
            Self::Done => "Done",
            Self::Unknown => "Unknown",
            Self::None => "None",
        };
        f.write_str(label)
    }
}

/// One tracked work item.
///
/// Description, order and tracker URL are owned by the registry, which
/// enforces their uniqueness; everything else may be edited directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    id: String,
    order: usize,
    description: String,
    tracker_url: Option<String>,
    secondary_url: Option<String>,
    status: TaskStatus,
    tags: Vec<String>,
    history: BTreeMap<NaiveDate, DailyWork>,
    notes: String,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order: 0,
            description: String::new(),
            tracker_url: None,
            secondary_url: None,
            status: TaskStatus::default(),
            tags: Vec::new(),
            history: BTreeMap::new(),
            notes: String::new(),
        }
    }
}

impl Task {
    /// Create a task with a fresh id.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = description;
    }

    pub fn tracker_url(&self) -> Option<&str> {
        self.tracker_url.as_deref()
    }

    pub(crate) fn set_tracker_url(&mut self, url: Option<String>) {
        self.tracker_url = url;
    }

    /// Whether the tracker URL points at a recognized tracker issue.
    pub fn is_linked_to_tracker(&self) -> bool {
        self.tracker_url
            .as_deref()
            .is_some_and(crate::tracker::is_tracker_url)
    }

    /// Secondary link (chat thread, document, ...).
    pub fn secondary_url(&self) -> Option<&str> {
        self.secondary_url.as_deref()
    }

    pub(crate) fn set_secondary_url(&mut self, url: Option<String>) {
        self.secondary_url = url;
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Append a tag unless it is already present. Returns `true` when added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if tag.trim().is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Returns `true` when the tag was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Ledger entries, oldest date first.
    pub fn history(&self) -> &BTreeMap<NaiveDate, DailyWork> {
        &self.history
    }

    /// Add `delta` to the time recorded on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ChronoError::NegativeDuration`] if `delta` is negative; the
    /// ledger is left untouched.
    pub fn add_duration(&mut self, date: NaiveDate, delta: TimeDelta) -> Result<()> {
        if delta < TimeDelta::zero() {
            return Err(ChronoError::NegativeDuration);
        }
        let work = self.history.entry(date).or_default();
        work.duration += delta;
        Ok(())
    }

    /// Overwrite the time recorded on `date` (manual correction).
    ///
    /// # Errors
    ///
    /// Returns [`ChronoError::NegativeDuration`] if `value` is negative.
    pub fn set_duration(&mut self, date: NaiveDate, value: TimeDelta) -> Result<()> {
        if value < TimeDelta::zero() {
            return Err(ChronoError::NegativeDuration);
        }
        self.history.entry(date).or_default().duration = value;
        Ok(())
    }

    pub fn total_duration(&self) -> TimeDelta {
        self.history
            .values()
            .fold(TimeDelta::zero(), |acc, work| acc + work.duration)
    }

    pub fn duration_for_date(&self, date: NaiveDate) -> TimeDelta {
        self.history
            .get(&date)
            .map_or_else(TimeDelta::zero, |work| work.duration)
    }

    pub fn duration_today(&self) -> TimeDelta {
        self.duration_for_date(today())
    }

    /// Time recorded in `[today - days, today]`, both ends included.
    pub fn duration_last_n_days(&self, days: u32) -> TimeDelta {
        self.duration_last_n_days_at(days, today())
    }

    /// [`Self::duration_last_n_days`] relative to an explicit `today`.
    pub fn duration_last_n_days_at(&self, days: u32, today: NaiveDate) -> TimeDelta {
        let start = today
            .checked_sub_signed(TimeDelta::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        self.history
            .range(start..=today)
            .fold(TimeDelta::zero(), |acc, (_, work)| acc + work.duration)
    }

    /// Time recorded over the last [`DEFAULT_RECENT_DAYS`] days.
    pub fn duration_recent(&self) -> TimeDelta {
        self.duration_last_n_days(DEFAULT_RECENT_DAYS)
    }

    /// Note for `date`, empty when none was written.
    pub fn note(&self, date: NaiveDate) -> &str {
        self.history.get(&date).map_or("", |work| work.note.as_str())
    }

    pub fn set_note(&mut self, date: NaiveDate, text: impl Into<String>) {
        self.history.entry(date).or_default().note = text.into();
    }

    /// Drop past entries under two minutes that carry no note.
    ///
    /// Irreversible. Only the registry calls this, right before a save.
    pub fn cleanup_history(&mut self) -> usize {
        self.cleanup_history_at(today())
    }

    /// [`Self::cleanup_history`] relative to an explicit `today`.
    pub fn cleanup_history_at(&mut self, today: NaiveDate) -> usize {
        let before = self.history.len();
        self.history
            .retain(|date, work| !work.is_prunable(*date, today));
        before - self.history.len()
    }

    /// Issue key of the linked tracker URL.
    pub fn tracker_key(&self) -> Option<String> {
        let url = self.tracker_url.as_deref()?;
        crate::tracker::parse_issue_url(url).ok().map(|issue| issue.key)
    }

    /// List label: `"{order} - {KEY}: {description}"`.
    pub fn label(&self) -> String {
        match self.tracker_key() {
            Some(key) => format!("{} - {key}: {}", self.order, self.description),
            None => format!("{} - {}", self.order, self.description),
        }
    }

    /// History label: `"{tracker_url}: {description}"` when a URL is set.
    pub fn history_label(&self) -> String {
        match self.tracker_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => format!("{url}: {}", self.description),
            None => self.description.clone(),
        }
    }

    /// Case-insensitive match of an already lowercased needle against the
    /// searchable text of this task.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        let hit = |text: &str| text.to_lowercase().contains(needle);
        hit(self.description.as_str())
            || self.tracker_url.as_deref().is_some_and(hit)
            || self.secondary_url.as_deref().is_some_and(hit)
            || hit(self.notes.as_str())
            || self.history.values().any(|work| hit(work.note.as_str()))
            || self.tags.iter().any(|tag| hit(tag.as_str()))
    }
}
