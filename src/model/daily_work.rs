//! One date's entry in a task's ledger.

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// Entries shorter than this (and without a note) are dropped by
/// [`super::Task::cleanup_history`] unless they belong to today.
pub const PRUNE_BELOW: TimeDelta = TimeDelta::minutes(2);

/// Time and note recorded for a task on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyWork {
    /// Accumulated time for the date. Never negative.
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: TimeDelta,
    /// Free-form note for the date.
    pub note: String,
}

impl Default for DailyWork {
    fn default() -> Self {
        Self {
            duration: TimeDelta::zero(),
            note: String::new(),
        }
    }
}

impl DailyWork {
    /// Whether this entry is noise that may be pruned.
    ///
    /// Today's entry is never prunable, whatever its size.
    pub fn is_prunable(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date != today && self.duration < PRUNE_BELOW && self.note.trim().is_empty()
    }
}

/// Durations are stored on disk as whole milliseconds.
mod duration_ms {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(TimeDelta::milliseconds(millis.max(0)))
    }
}
