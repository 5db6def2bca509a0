//! The ordered, in-memory collection of all tasks.
//!
//! [`TaskRegistry`] enforces the collection invariants (unique descriptions,
//! unique tracker URLs, dense `0..N-1` ordering) and mirrors the collection
//! to a [`PersistenceStore`] on a fixed cadence and once more at shutdown.
//!
//! Lock order is registry list first, then individual tasks.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ChronoError, Result};
use crate::events::{ChronoEvent, EventBus};
use crate::model::{SharedTask, Task, TaskCollection, today};
use crate::scheduler::periodic_ticker;
use crate::store::PersistenceStore;

/// Reference autosave cadence.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Task collection shared by the foreground and all background jobs.
///
/// Cheaply cloneable; clones refer to the same registry.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    tasks: RwLock<Vec<SharedTask>>,
    store: Arc<dyn PersistenceStore>,
    events: EventBus,
    last_saved_at: RwLock<Option<DateTime<Local>>>,
    autosave: Mutex<Option<AutosaveLoop>>,
}

struct AutosaveLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.len())
            .finish_non_exhaustive()
    }
}

impl TaskRegistry {
    /// Empty registry backed by `store`. Nothing is loaded.
    pub fn new(store: Arc<dyn PersistenceStore>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tasks: RwLock::new(Vec::new()),
                store,
                events,
                last_saved_at: RwLock::new(None),
                autosave: Mutex::new(None),
            }),
        }
    }

    /// Registry filled from `store`, sorted by each task's stored order.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the collection cannot be loaded.
    pub fn load(store: Arc<dyn PersistenceStore>, events: EventBus) -> Result<Self> {
        let mut collection = store.load()?;
        collection.tasks.sort_by_key(Task::order);
        let tasks: Vec<SharedTask> = collection
            .tasks
            .into_iter()
            .enumerate()
            .map(|(index, mut task)| {
                task.set_order(index);
                SharedTask::new(task)
            })
            .collect();

        info!("loaded {} tasks", tasks.len());
        let registry = Self::new(store, events);
        *registry.write_tasks() = tasks;
        Ok(registry)
    }

    fn read_tasks(&self) -> RwLockReadGuard<'_, Vec<SharedTask>> {
        self.inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tasks(&self) -> RwLockWriteGuard<'_, Vec<SharedTask>> {
        self.inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Event stream the registry publishes to.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// All tasks in display order.
    pub fn tasks(&self) -> Vec<SharedTask> {
        self.read_tasks().clone()
    }

    pub fn len(&self) -> usize {
        self.read_tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_tasks().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<SharedTask> {
        self.read_tasks().iter().find(|t| t.id() == id).cloned()
    }

    /// Task with exactly this description.
    pub fn find_by_description(&self, description: &str) -> Option<SharedTask> {
        self.read_tasks()
            .iter()
            .find(|t| t.read().description() == description)
            .cloned()
    }

    /// Append a new task.
    ///
    /// # Errors
    ///
    /// [`ChronoError::EmptyDescription`] for a blank description,
    /// [`ChronoError::DuplicateDescription`] if another task already uses it.
    pub fn create(&self, description: impl Into<String>) -> Result<SharedTask> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ChronoError::EmptyDescription);
        }

        let mut tasks = self.write_tasks();
        if tasks.iter().any(|t| t.read().description() == description) {
            return Err(ChronoError::DuplicateDescription(description));
        }

        let mut task = Task::new(description);
        task.set_order(tasks.len());
        let shared = SharedTask::new(task);
        tasks.push(shared.clone());
        drop(tasks);

        debug!(id = shared.id(), "task created");
        self.inner.events.emit(ChronoEvent::TasksChanged);
        Ok(shared)
    }

    /// Change a task's description.
    ///
    /// Renaming a task to its current description succeeds.
    ///
    /// # Errors
    ///
    /// Same validation as [`Self::create`], plus [`ChronoError::UnknownTask`].
    pub fn rename(&self, task: &SharedTask, new_description: impl Into<String>) -> Result<()> {
        let new_description = new_description.into();
        if new_description.trim().is_empty() {
            return Err(ChronoError::EmptyDescription);
        }

        let tasks = self.read_tasks();
        ensure_member(&tasks, task)?;
        let taken = tasks
            .iter()
            .filter(|t| !t.same_task(task))
            .any(|t| t.read().description() == new_description);
        if taken {
            return Err(ChronoError::DuplicateDescription(new_description));
        }
        task.write().set_description(new_description);
        drop(tasks);

        self.emit_updated(task);
        Ok(())
    }

    /// Link a task to a tracker issue. `None` or a blank URL clears the link.
    ///
    /// # Errors
    ///
    /// [`ChronoError::DuplicateTrackerUrl`] if another task already links the
    /// same URL, [`ChronoError::UnknownTask`] if `task` is not registered.
    pub fn set_tracker_url(&self, task: &SharedTask, url: Option<String>) -> Result<()> {
        let url = url.filter(|u| !u.trim().is_empty());

        let tasks = self.read_tasks();
        ensure_member(&tasks, task)?;
        if let Some(url) = url.as_deref() {
            let taken = tasks
                .iter()
                .filter(|t| !t.same_task(task))
                .any(|t| t.read().tracker_url() == Some(url));
            if taken {
                return Err(ChronoError::DuplicateTrackerUrl(url.to_owned()));
            }
        }
        task.write().set_tracker_url(url);
        drop(tasks);

        self.emit_updated(task);
        Ok(())
    }

    /// Set the secondary link. Not required to be unique.
    pub fn set_secondary_url(&self, task: &SharedTask, url: Option<String>) -> Result<()> {
        let url = url.filter(|u| !u.trim().is_empty());
        ensure_member(&self.read_tasks(), task)?;
        task.write().set_secondary_url(url);
        self.emit_updated(task);
        Ok(())
    }

    /// Apply an edit to the freely editable fields of a task (notes, tags,
    /// ledger, status) and notify subscribers.
    pub fn update<R>(&self, task: &SharedTask, edit: impl FnOnce(&mut Task) -> R) -> R {
        let result = edit(&mut task.write());
        self.emit_updated(task);
        result
    }

    /// Remove a task and close the gap in the ordering.
    pub fn remove(&self, task: &SharedTask) -> Result<()> {
        let mut tasks = self.write_tasks();
        let index = tasks
            .iter()
            .position(|t| t.same_task(task))
            .ok_or_else(|| ChronoError::UnknownTask(task.id().to_owned()))?;
        tasks.remove(index);
        renumber(&tasks);
        drop(tasks);

        debug!(id = task.id(), "task removed");
        self.inner.events.emit(ChronoEvent::TasksChanged);
        Ok(())
    }

    /// Adopt `new_sequence` as the display order, numbering it `0..N-1`.
    ///
    /// Passing the registry's own [`Self::tasks`] back in is a no-op apart
    /// from renumbering.
    pub fn reorder(&self, new_sequence: Vec<SharedTask>) {
        let mut tasks = self.write_tasks();
        renumber(&new_sequence);
        *tasks = new_sequence;
        drop(tasks);

        self.inner.events.emit(ChronoEvent::TasksChanged);
    }

    /// Tasks whose description, links, notes, daily notes or tags contain
    /// `query`, ignoring case. A blank query returns every task.
    pub fn filter(&self, query: &str) -> Vec<SharedTask> {
        if query.trim().is_empty() {
            return self.tasks();
        }
        let needle = query.to_lowercase();
        self.read_tasks()
            .iter()
            .filter(|t| t.read().matches_lowercase(&needle))
            .cloned()
            .collect()
    }

    /// Prune each task's ledger, snapshot the collection and save it.
    ///
    /// # Errors
    ///
    /// Returns the store's error; in-memory state is unaffected.
    pub fn persist(&self) -> Result<()> {
        let day = today();
        let tasks = self.tasks();
        let collection = TaskCollection {
            tasks: tasks
                .iter()
                .map(|shared| {
                    let mut task = shared.write();
                    task.cleanup_history_at(day);
                    task.clone()
                })
                .collect(),
        };

        self.inner.store.save(&collection)?;

        let now = Local::now();
        *self
            .inner
            .last_saved_at
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(now);
        debug!("saved {} tasks", collection.tasks.len());
        self.inner.events.emit(ChronoEvent::Saved { at: now });
        Ok(())
    }

    /// When the collection was last saved successfully.
    pub fn last_saved_at(&self) -> Option<DateTime<Local>> {
        *self
            .inner
            .last_saved_at
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Save every `every` in the background. Failed saves are logged and
    /// retried on the next cycle. No-op while already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_autosave(&self, every: Duration) {
        let mut slot = self
            .inner
            .autosave
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|l| !l.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(autosave_loop(
            Arc::downgrade(&self.inner),
            every,
            cancel.clone(),
        ));
        *slot = Some(AutosaveLoop { cancel, handle });
        info!("autosave every {every:?}");
    }

    /// Stop autosaving, then save one final time.
    ///
    /// # Errors
    ///
    /// The final save's error is returned, since nothing will retry it.
    pub async fn shutdown(&self) -> Result<()> {
        let running = self
            .inner
            .autosave
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!("autosave loop ended abnormally: {e}");
            }
        }

        self.persist().inspect_err(|e| {
            tracing::error!("final save failed: {e}");
        })
    }

    fn emit_updated(&self, task: &SharedTask) {
        self.inner.events.emit(ChronoEvent::TaskUpdated {
            id: task.id().to_owned(),
        });
    }
}

fn ensure_member(tasks: &[SharedTask], task: &SharedTask) -> Result<()> {
    if tasks.iter().any(|t| t.same_task(task)) {
        Ok(())
    } else {
        Err(ChronoError::UnknownTask(task.id().to_owned()))
    }
}

fn renumber(tasks: &[SharedTask]) {
    for (index, task) in tasks.iter().enumerate() {
        task.write().set_order(index);
    }
}

async fn autosave_loop(registry: Weak<RegistryInner>, every: Duration, cancel: CancellationToken) {
    let mut ticker = periodic_ticker(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = registry.upgrade() else {
                    break;
                };
                let registry = TaskRegistry { inner };
                match tokio::task::spawn_blocking(move || registry.persist()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("autosave failed, retrying next cycle: {e}"),
                    Err(e) => warn!("autosave task failed: {e}"),
                }
            }
        }
    }
    debug!("autosave loop stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::model::TaskStatus;
    use crate::store::MemoryStore;
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> (TaskRegistry, MemoryStore) {
        let store = MemoryStore::new();
        let registry = TaskRegistry::new(Arc::new(store.clone()), EventBus::new());
        (registry, store)
    }

    /// Fails the first `failures` saves, then delegates to a memory store.
    struct FlakyStore {
        failures: AtomicUsize,
        attempts: AtomicUsize,
        inner: MemoryStore,
    }

    impl PersistenceStore for FlakyStore {
        fn load(&self) -> Result<TaskCollection> {
            self.inner.load()
        }

        fn save(&self, collection: &TaskCollection) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ChronoError::Persistence("disk full".to_owned()));
            }
            self.inner.save(collection)
        }
    }

    #[test]
    fn create_appends_with_next_order() {
        let (registry, _) = registry();
        let first = registry.create("Foo").unwrap();
        let second = registry.create("Bar").unwrap();
        assert_eq!(first.read().order(), 0);
        assert_eq!(second.read().order(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_description_is_rejected() {
        let (registry, _) = registry();
        registry.create("Task A").unwrap();
        let err = registry.create("Task A").unwrap_err();
        assert!(matches!(err, ChronoError::DuplicateDescription(_)));
        assert!(err.is_validation());
        assert_eq!(registry.len(), 1);

        // Case-sensitive.
        registry.create("task a").unwrap();
    }

    #[test]
    fn blank_description_is_rejected() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.create("  ").unwrap_err(),
            ChronoError::EmptyDescription
        ));
    }

    #[test]
    fn rename_checks_other_tasks_only() {
        let (registry, _) = registry();
        let a = registry.create("Task A").unwrap();
        let b = registry.create("Task B").unwrap();

        let err = registry.rename(&b, "Task A").unwrap_err();
        assert!(matches!(err, ChronoError::DuplicateDescription(_)));
        assert_eq!(b.description(), "Task B");

        registry.rename(&a, "Task A").unwrap();
        registry.rename(&a, "Task C").unwrap();
        assert_eq!(a.description(), "Task C");
    }

    #[test]
    fn tracker_urls_are_unique_when_set() {
        let (registry, _) = registry();
        let a = registry.create("Task A").unwrap();
        let b = registry.create("Task B").unwrap();
        registry
            .set_tracker_url(&a, Some("http://jira.com/1".to_owned()))
            .unwrap();

        let err = registry
            .set_tracker_url(&b, Some("http://jira.com/1".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ChronoError::DuplicateTrackerUrl(_)));
        assert_eq!(b.read().tracker_url(), None);

        registry
            .set_tracker_url(&b, Some("http://jira.com/2".to_owned()))
            .unwrap();
        registry.set_tracker_url(&a, Some(" ".to_owned())).unwrap();
        assert_eq!(a.read().tracker_url(), None);
        registry
            .set_tracker_url(&b, Some("http://jira.com/1".to_owned()))
            .unwrap();
    }

    #[test]
    fn foreign_task_is_unknown() {
        let (registry, _) = registry();
        let stranger = SharedTask::new(Task::new("Elsewhere"));
        assert!(matches!(
            registry.rename(&stranger, "x").unwrap_err(),
            ChronoError::UnknownTask(_)
        ));
        assert!(matches!(
            registry.remove(&stranger).unwrap_err(),
            ChronoError::UnknownTask(_)
        ));
    }

    #[test]
    fn reorder_assigns_dense_order() {
        let (registry, _) = registry();
        let t1 = registry.create("A").unwrap();
        let t2 = registry.create("B").unwrap();

        registry.reorder(vec![t2.clone(), t1.clone()]);

        assert_eq!(t2.read().order(), 0);
        assert_eq!(t1.read().order(), 1);
        assert_eq!(registry.tasks()[0].description(), "B");
    }

    #[test]
    fn reorder_with_own_sequence_keeps_everything() {
        let (registry, _) = registry();
        let t1 = registry.create("Task 1").unwrap();
        let t2 = registry.create("Task 2").unwrap();

        registry.reorder(registry.tasks());

        let tasks = registry.tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.contains(&t1));
        assert!(tasks.contains(&t2));
    }

    #[test]
    fn remove_closes_order_gap() {
        let (registry, _) = registry();
        let a = registry.create("A").unwrap();
        let b = registry.create("B").unwrap();
        let c = registry.create("C").unwrap();
        registry.remove(&b).unwrap();
        assert_eq!(a.read().order(), 0);
        assert_eq!(c.read().order(), 1);
    }

    #[test]
    fn filter_searches_every_text_field() {
        let (registry, _) = registry();
        let milk = registry.create("Buy Milk").unwrap();
        let dog = registry.create("Walk Dog").unwrap();

        assert_eq!(registry.filter("Milk"), vec![milk.clone()]);
        assert_eq!(registry.filter("milk"), vec![milk.clone()]);
        assert_eq!(registry.filter("").len(), 2);
        assert_eq!(registry.filter("   ").len(), 2);
        assert!(registry.filter("Cat").is_empty());

        registry.update(&dog, |t| t.set_notes("Remember to buy poop bags"));
        assert_eq!(registry.filter("buy").len(), 2);
        assert_eq!(registry.filter("bags"), vec![dog.clone()]);

        milk.set_note(today(), "Got some organic milk");
        assert_eq!(registry.filter("organic"), vec![milk.clone()]);

        registry
            .set_tracker_url(&dog, Some("https://jira.example.com/browse/DOG-123".to_owned()))
            .unwrap();
        assert_eq!(registry.filter("dog-123"), vec![dog.clone()]);

        registry
            .set_secondary_url(&milk, Some("https://slack.com/archives/C12345".to_owned()))
            .unwrap();
        assert_eq!(registry.filter("archives/C12345"), vec![milk.clone()]);

        milk.add_tag("Groceries");
        assert_eq!(registry.filter("grocer"), vec![milk]);
    }

    #[test]
    fn filter_follows_registry_order() {
        let (registry, _) = registry();
        let a = registry.create("alpha task").unwrap();
        let b = registry.create("beta task").unwrap();
        registry.reorder(vec![b.clone(), a.clone()]);
        assert_eq!(registry.filter("task"), vec![b, a]);
    }

    #[test]
    fn persist_prunes_and_saves_snapshot() {
        let (registry, store) = registry();
        let task = registry.create("Report").unwrap();
        let old = today() - TimeDelta::days(3);
        task.set_duration(old, TimeDelta::seconds(30)).unwrap();
        task.set_duration(today(), TimeDelta::zero()).unwrap();
        task.set_status(TaskStatus::InProgress);

        registry.persist().unwrap();

        let saved = store.saved().expect("saved");
        assert_eq!(saved.tasks.len(), 1);
        assert!(!saved.tasks[0].history().contains_key(&old));
        assert!(saved.tasks[0].history().contains_key(&today()));
        assert_eq!(saved.tasks[0].status(), TaskStatus::InProgress);
        assert!(registry.last_saved_at().is_some());
    }

    #[test]
    fn load_sorts_by_stored_order() {
        let mut first = Task::new("first");
        first.set_order(5);
        let mut second = Task::new("second");
        second.set_order(1);
        let store = MemoryStore::with_collection(TaskCollection {
            tasks: vec![first, second],
        });

        let registry = TaskRegistry::load(Arc::new(store), EventBus::new()).unwrap();
        let tasks = registry.tasks();
        assert_eq!(tasks[0].description(), "second");
        assert_eq!(tasks[0].read().order(), 0);
        assert_eq!(tasks[1].read().order(), 1);
    }

    #[test]
    fn edits_emit_events() {
        let (registry, _) = registry();
        let mut rx = registry.events().subscribe();
        let task = registry.create("Observed").unwrap();
        registry.rename(&task, "Observed twice").unwrap();

        assert_eq!(rx.try_recv().unwrap(), ChronoEvent::TasksChanged);
        assert_eq!(
            rx.try_recv().unwrap(),
            ChronoEvent::TaskUpdated {
                id: task.id().to_owned()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_retries_after_failure() {
        let store = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            attempts: AtomicUsize::new(0),
            inner: MemoryStore::new(),
        });
        let registry = TaskRegistry::new(store.clone(), EventBus::new());
        registry.create("Keep me").unwrap();

        registry.start_autosave(Duration::from_secs(30));
        let saved = tokio::time::timeout(Duration::from_secs(600), async {
            while store.inner.saved().is_none() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
        .await;

        assert!(saved.is_ok(), "a later cycle should succeed");
        assert!(store.attempts.load(Ordering::SeqCst) >= 2);
        registry.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn huge_autosave_interval_keeps_loop_alive() {
        let (registry, store) = registry();
        registry.create("Saved at shutdown").unwrap();
        registry.start_autosave(Duration::MAX);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let alive = registry
            .inner
            .autosave
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|l| !l.handle.is_finished());
        assert!(alive);

        registry.shutdown().await.unwrap();
        assert_eq!(store.saved().unwrap().tasks.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_surfaces_final_save_error() {
        let store = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            attempts: AtomicUsize::new(0),
            inner: MemoryStore::new(),
        });
        let registry = TaskRegistry::new(store, EventBus::new());
        registry.start_autosave(Duration::from_secs(3600));

        let err = registry.shutdown().await.unwrap_err();
        assert!(matches!(err, ChronoError::Persistence(_)));
    }
}
