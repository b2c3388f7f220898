//! TaskManager - registry of live tasks for one namespace.
//!
//! Design:
//! - The `StatusStore` is the single source of truth for status. It knows
//!   about ids that were never materialized in this process.
//! - `tasks` is a cache of live `Task` handles (at most one per id). A task
//!   leaves it the moment it is archived.
//! - `set_task_status` is the only status mutation path: store write, then
//!   manager-wide post, then (for Archived) eviction.
//! - No lock is held while handlers run.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::diagnostics::Diagnostics;
use super::task::Task;
use crate::bus::{EventBus, SubscriptionId};
use crate::domain::{ManagerId, TaskId, TaskStatus, TaskitError};
use crate::impls::InMemoryStatusStore;
use crate::ports::StatusStore;

/// Owner of a task namespace.
///
/// Dropping the manager drops every live task it holds; handles still held by
/// callers become detached.
pub struct TaskManager {
    shared: Arc<ManagerShared>,
}

/// State shared between the manager and its tasks (tasks hold it weakly).
pub(crate) struct ManagerShared {
    id: ManagerId,
    name: String,
    state: Mutex<ManagerState>,
    events: EventBus<TaskStatus, TaskId>,
    diagnostics: Option<Arc<Diagnostics>>,
}

struct ManagerState {
    store: Box<dyn StatusStore>,
    tasks: HashMap<TaskId, Task>,
}

/// Builder for [`TaskManager`].
///
/// # Example
/// ```ignore
/// let diagnostics = Arc::new(Diagnostics::new());
/// let manager = TaskManager::builder("quests")
///     .store(InMemoryStatusStore::new())
///     .diagnostics(Arc::clone(&diagnostics))
///     .build();
/// ```
pub struct TaskManagerBuilder {
    name: String,
    store: Option<Box<dyn StatusStore>>,
    diagnostics: Option<Arc<Diagnostics>>,
}

impl TaskManagerBuilder {
    /// Use `store` instead of a fresh [`InMemoryStatusStore`].
    pub fn store<S: StatusStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Register the manager with a diagnostics registry.
    pub fn diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn build(self) -> TaskManager {
        let store = self
            .store
            .unwrap_or_else(|| Box::new(InMemoryStatusStore::new()));
        let shared = Arc::new(ManagerShared {
            id: ManagerId::generate(),
            name: self.name,
            state: Mutex::new(ManagerState {
                store,
                tasks: HashMap::new(),
            }),
            events: EventBus::new(),
            diagnostics: self.diagnostics,
        });
        tracing::debug!("task manager '{}' created as {}", shared.name, shared.id);

        if let Some(diagnostics) = &shared.diagnostics {
            diagnostics.register(&shared);
        }
        TaskManager { shared }
    }
}

impl TaskManager {
    /// Manager with an in-memory store and no diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    pub fn builder(name: impl Into<String>) -> TaskManagerBuilder {
        TaskManagerBuilder {
            name: name.into(),
            store: None,
            diagnostics: None,
        }
    }

    pub fn id(&self) -> ManagerId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Return the live task for `task_id`, creating it on first use.
    ///
    /// # Errors
    /// [`TaskitError::Archived`] when the store already has the id archived.
    /// Archival is permanent; an archived id cannot be materialized again.
    pub fn ensure_task(&self, task_id: TaskId) -> Result<Task, TaskitError> {
        let mut state = self.shared.lock();
        if state.store.status(task_id).is_terminal() {
            return Err(TaskitError::Archived(task_id));
        }
        let task = state
            .tasks
            .entry(task_id)
            .or_insert_with(|| Task::new(task_id, Arc::downgrade(&self.shared)))
            .clone();
        Ok(task)
    }

    /// Live task for `task_id`, if one has been materialized.
    pub fn task(&self, task_id: TaskId) -> Option<Task> {
        self.shared.live_task(task_id)
    }

    pub fn task_status(&self, task_id: TaskId) -> TaskStatus {
        self.shared.status(task_id)
    }

    pub fn is_task_archived(&self, task_id: TaskId) -> bool {
        self.task_status(task_id) == TaskStatus::Archived
    }

    /// Archive `task_id` whether or not it was materialized.
    ///
    /// A live task goes through [`Task::archive`] so its own listeners run;
    /// otherwise the store is written directly.
    ///
    /// # Errors
    /// [`TaskitError::IllegalTransition`] when the id is already archived.
    pub fn archive_task(&self, task_id: TaskId) -> Result<(), TaskitError> {
        if let Some(task) = self.task(task_id) {
            return task.archive();
        }

        let from = self.task_status(task_id);
        if from.is_terminal() {
            tracing::warn!("task {task_id}: already archived");
            return Err(TaskitError::IllegalTransition {
                task_id,
                from,
                to: TaskStatus::Archived,
            });
        }
        self.shared.set_task_status(task_id, TaskStatus::Archived);
        Ok(())
    }

    /// Every id the store knows about.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.shared.task_ids()
    }

    /// Ids with a live `Task` object, sorted.
    pub fn live_task_ids(&self) -> Vec<TaskId> {
        self.shared.live_task_ids()
    }

    /// Run `handler` every time any task of this manager reaches `status`.
    pub fn on<F>(&self, status: TaskStatus, handler: F) -> SubscriptionId
    where
        F: Fn(&TaskId) + Send + Sync + 'static,
    {
        self.shared.events.on(status, handler)
    }

    /// Run `handler` the next time any task of this manager reaches `status`.
    pub fn once<F>(&self, status: TaskStatus, handler: F) -> SubscriptionId
    where
        F: Fn(&TaskId) + Send + Sync + 'static,
    {
        self.shared.events.once(status, handler)
    }

    pub fn off(&self, status: TaskStatus, id: SubscriptionId) -> bool {
        self.shared.events.off(&status, id)
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("live_tasks", &self.shared.live_task_ids())
            .finish()
    }
}

impl ManagerShared {
    pub(crate) fn id(&self) -> ManagerId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn diagnostics(&self) -> Option<&Arc<Diagnostics>> {
        self.diagnostics.as_ref()
    }

    pub(crate) fn status(&self, task_id: TaskId) -> TaskStatus {
        self.lock().store.status(task_id)
    }

    pub(crate) fn task_ids(&self) -> Vec<TaskId> {
        self.lock().store.task_ids()
    }

    pub(crate) fn live_task(&self, task_id: TaskId) -> Option<Task> {
        self.lock().tasks.get(&task_id).cloned()
    }

    pub(crate) fn live_task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.lock().tasks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The only way a status changes.
    ///
    /// Returns `false` without notifying anyone when `status` is already
    /// recorded. The store write is committed before any handler runs, so it
    /// stands even if a handler panics; eviction of an archived task also
    /// happens on that path.
    pub(crate) fn set_task_status(&self, task_id: TaskId, status: TaskStatus) -> bool {
        {
            let mut state = self.lock();
            if state.store.status(task_id) == status {
                return false;
            }
            state.store.set_status(task_id, status);
        }

        let _eviction = (status == TaskStatus::Archived).then(|| Eviction {
            manager: self,
            task_id,
        });
        self.events.post(&status, &task_id);
        true
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes an archived task from the registry once the Archived post is over,
/// so Archived listeners can still find it.
struct Eviction<'a> {
    manager: &'a ManagerShared,
    task_id: TaskId,
}

impl Drop for Eviction<'_> {
    fn drop(&mut self) {
        let evicted = self.manager.lock().tasks.remove(&self.task_id);
        if let Some(task) = evicted {
            task.mark_detached();
            tracing::debug!(
                "task {} evicted from manager '{}'",
                self.task_id,
                self.manager.name
            );
        }
    }
}
