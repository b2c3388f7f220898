//! Diagnostics - read-only introspection over live managers.
//!
//! A debugging view (editor panel, TUI, CLI report) needs to list managers,
//! their tasks, and what each pending task is waiting on. This registry is
//! the only thing such a view talks to.
//!
//! # Design
//! - Passed explicitly (`Arc<Diagnostics>` on the manager builder). There is
//!   no global; a manager built without it works exactly the same.
//! - Managers are held weakly and listed by `ManagerId`. Entries whose
//!   manager was dropped report nothing and are pruned on the next listing.
//! - Hooks are best-effort: a panicking hook is caught and logged, it never
//!   unwinds into a task transition.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use super::manager::ManagerShared;
use crate::bus::{EventBus, SubscriptionId};
use crate::domain::{ManagerId, TaskId, TaskStatus};

/// A live manager as seen by diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerInfo {
    pub id: ManagerId,
    pub name: String,
}

/// Which task a "dependencies checked" notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub manager_id: ManagerId,
    pub task_id: TaskId,
}

/// One attached dependency and whether it is satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub name: String,
    pub active: bool,
}

/// Serializable view of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub dependencies: Vec<DependencyInfo>,
}

/// Serializable view of one manager and every task it knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    pub id: ManagerId,
    pub name: String,
    pub tasks: Vec<TaskSnapshot>,
}

/// Process-wide diagnostics registry. Starts empty; needs no teardown.
pub struct Diagnostics {
    managers: Mutex<Vec<(ManagerId, Weak<ManagerShared>)>>,
    manager_registered: EventBus<(), ManagerInfo>,
    dependencies_checked: EventBus<(), TaskRef>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            managers: Mutex::new(Vec::new()),
            manager_registered: EventBus::new(),
            dependencies_checked: EventBus::new(),
        }
    }

    // ---- queries ----------------------------------------------------------

    /// Live managers in registration order.
    pub fn managers(&self) -> Vec<ManagerInfo> {
        let mut managers = self.lock();
        managers.retain(|(_, weak)| weak.strong_count() > 0);
        managers
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .map(|manager| ManagerInfo {
                id: manager.id(),
                name: manager.name().to_owned(),
            })
            .collect()
    }

    /// Status of `task_id` in `manager_id`'s store, or `None` when the manager
    /// is gone or was never registered.
    pub fn task_status(&self, manager_id: ManagerId, task_id: TaskId) -> Option<TaskStatus> {
        self.manager(manager_id).map(|m| m.status(task_id))
    }

    /// What a live task is waiting on, in attachment order.
    ///
    /// Empty once the task is Completed or Archived, when the task has no live
    /// object, or when the manager is gone.
    pub fn dependencies(&self, manager_id: ManagerId, task_id: TaskId) -> Vec<DependencyInfo> {
        let Some(manager) = self.manager(manager_id) else {
            return Vec::new();
        };
        dependency_infos(&manager, task_id)
    }

    /// Ids that are not archived: everything in the store that isn't, plus
    /// live tasks that never wrote a status yet. Sorted.
    pub fn unarchived_task_ids(&self, manager_id: ManagerId) -> Vec<TaskId> {
        let Some(manager) = self.manager(manager_id) else {
            return Vec::new();
        };
        known_task_ids(&manager)
            .into_iter()
            .filter(|id| manager.status(*id) != TaskStatus::Archived)
            .collect()
    }

    /// Archived ids in `manager_id`'s store. Sorted.
    pub fn archived_task_ids(&self, manager_id: ManagerId) -> Vec<TaskId> {
        let Some(manager) = self.manager(manager_id) else {
            return Vec::new();
        };
        let mut ids: Vec<TaskId> = manager
            .task_ids()
            .into_iter()
            .filter(|id| manager.status(*id) == TaskStatus::Archived)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Everything above for one manager, in a form that serializes.
    pub fn snapshot(&self, manager_id: ManagerId) -> Option<ManagerSnapshot> {
        let manager = self.manager(manager_id)?;
        let tasks = known_task_ids(&manager)
            .into_iter()
            .map(|task_id| TaskSnapshot {
                task_id,
                status: manager.status(task_id),
                dependencies: dependency_infos(&manager, task_id),
            })
            .collect();
        Some(ManagerSnapshot {
            id: manager.id(),
            name: manager.name().to_owned(),
            tasks,
        })
    }

    // ---- hooks ------------------------------------------------------------

    /// Called whenever a manager is built with this registry.
    pub fn on_manager_registered<F>(&self, hook: F) -> SubscriptionId
    where
        F: Fn(&ManagerInfo) + Send + Sync + 'static,
    {
        self.manager_registered.on((), hook)
    }

    pub fn off_manager_registered(&self, id: SubscriptionId) -> bool {
        self.manager_registered.off(&(), id)
    }

    /// Called after every dependency scan of any registered manager's tasks.
    pub fn on_dependencies_checked<F>(&self, hook: F) -> SubscriptionId
    where
        F: Fn(&TaskRef) + Send + Sync + 'static,
    {
        self.dependencies_checked.on((), hook)
    }

    pub fn off_dependencies_checked(&self, id: SubscriptionId) -> bool {
        self.dependencies_checked.off(&(), id)
    }

    // ---- called by the engine ----------------------------------------------

    pub(crate) fn register(&self, manager: &Arc<ManagerShared>) {
        let info = ManagerInfo {
            id: manager.id(),
            name: manager.name().to_owned(),
        };
        self.lock().push((info.id, Arc::downgrade(manager)));
        tracing::info!("registered task manager '{}' ({})", info.name, info.id);
        notify(&self.manager_registered, &info);
    }

    pub(crate) fn dependencies_checked(&self, task: &TaskRef) {
        notify(&self.dependencies_checked, task);
    }

    fn manager(&self, manager_id: ManagerId) -> Option<Arc<ManagerShared>> {
        self.lock()
            .iter()
            .find(|(id, _)| *id == manager_id)
            .and_then(|(_, weak)| weak.upgrade())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ManagerId, Weak<ManagerShared>)>> {
        self.managers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

fn notify<P>(bus: &EventBus<(), P>, payload: &P) {
    if catch_unwind(AssertUnwindSafe(|| bus.post(&(), payload))).is_err() {
        tracing::warn!("diagnostics hook panicked; notification dropped");
    }
}

/// Store ids plus live ids, sorted and deduplicated.
fn known_task_ids(manager: &ManagerShared) -> Vec<TaskId> {
    let mut ids = manager.task_ids();
    ids.extend(manager.live_task_ids());
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn dependency_infos(manager: &ManagerShared, task_id: TaskId) -> Vec<DependencyInfo> {
    let Some(task) = manager.live_task(task_id) else {
        return Vec::new();
    };
    if !task.status().tracks_dependencies() {
        return Vec::new();
    }
    task.dependencies()
        .iter()
        .map(|d| DependencyInfo {
            name: d.name().to_owned(),
            active: d.is_active(),
        })
        .collect()
}
