//! Durable storage for the task collection.
//!
//! [`PersistenceStore`] is the seam between the in-memory registry and disk.
//! [`JsonFileStore`] writes pretty JSON atomically (temp file + fsync +
//! rename); [`MemoryStore`] keeps the collection in memory for tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ChronoError, Result};
use crate::model::TaskCollection;

/// Load/save contract for the task collection.
pub trait PersistenceStore: Send + Sync {
    /// Load the stored collection. A store with nothing saved yet returns an
    /// empty collection.
    fn load(&self) -> Result<TaskCollection>;

    /// Replace the stored collection.
    fn save(&self, collection: &TaskCollection) -> Result<()>;
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.json".to_owned());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl PersistenceStore for JsonFileStore {
    fn load(&self) -> Result<TaskCollection> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TaskCollection::default());
            }
            Err(e) => {
                return Err(ChronoError::Persistence(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            ChronoError::Persistence(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn save(&self, collection: &TaskCollection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChronoError::Persistence(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(collection)
            .map_err(|e| ChronoError::Persistence(format!("cannot serialize tasks: {e}")))?;

        let tmp_path = self.tmp_path();
        let write_tmp = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write_tmp().map_err(|e| {
            ChronoError::Persistence(format!(
                "cannot write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ChronoError::Persistence(format!(
                "cannot move temp file to {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// In-memory store. Cheaply cloneable; clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Arc<Mutex<Option<TaskCollection>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a collection.
    pub fn with_collection(collection: TaskCollection) -> Self {
        let store = Self::default();
        *store.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(collection);
        store
    }

    /// Last saved collection, if any.
    pub fn saved(&self) -> Option<TaskCollection> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistenceStore for MemoryStore {
    fn load(&self) -> Result<TaskCollection> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, collection: &TaskCollection) -> Result<()> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(collection.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
