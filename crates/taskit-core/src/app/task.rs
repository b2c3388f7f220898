//! Task - one unit of work gated by dependencies.
//!
//! A `Task` is a cheap, clonable handle. The manager keeps one handle per live
//! task id; callers get clones. Status is never stored on the task: every read
//! and write goes through the manager's `StatusStore`.
//!
//! Ownership:
//! - task -> manager: weak (a task never keeps its manager alive)
//! - dependency callback -> task: weak (a waiting dependency never keeps a
//!   task alive)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::diagnostics::TaskRef;
use super::manager::ManagerShared;
use crate::bus::{EventBus, SubscriptionId};
use crate::dependency::Dependency;
use crate::domain::{TaskId, TaskStatus, TaskitError};

#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    manager: Weak<ManagerShared>,
    dependencies: Mutex<Vec<Arc<dyn Dependency>>>,
    events: EventBus<TaskStatus, Task>,
    /// Set when the manager evicts this task from its registry.
    detached: AtomicBool,
}

impl Task {
    pub(crate) fn new(id: TaskId, manager: Weak<ManagerShared>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id,
                manager,
                dependencies: Mutex::new(Vec::new()),
                events: EventBus::new(),
                detached: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Current status, read from the manager's store.
    ///
    /// A task whose manager has been dropped can never move again and reports
    /// `Archived`.
    pub fn status(&self) -> TaskStatus {
        match self.inner.manager.upgrade() {
            Some(manager) => manager.status(self.inner.id),
            None => TaskStatus::Archived,
        }
    }

    /// Has this handle been cut loose from its manager (archived and evicted,
    /// or the manager is gone)?
    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::SeqCst) || self.inner.manager.strong_count() == 0
    }

    /// Do both handles point at the same task object?
    #[cfg(test)]
    pub(crate) fn ptr_eq(a: &Task, b: &Task) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    // ---- per-task notifications ------------------------------------------

    /// Run `handler` every time this task reaches `status`.
    pub fn on<F>(&self, status: TaskStatus, handler: F) -> SubscriptionId
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        self.inner.events.on(status, handler)
    }

    /// Run `handler` the next time this task reaches `status`.
    pub fn once<F>(&self, status: TaskStatus, handler: F) -> SubscriptionId
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        self.inner.events.once(status, handler)
    }

    pub fn off(&self, status: TaskStatus, id: SubscriptionId) -> bool {
        self.inner.events.off(&status, id)
    }

    // ---- dependencies -----------------------------------------------------

    /// Attach a dependency. Allowed in any status; attaching to a task that is
    /// already Active does not send it back to Pending.
    pub fn add_dependency(&self, dependency: Arc<dyn Dependency>) {
        self.lock_dependencies().push(dependency);
    }

    /// Detach the first attached entry that is the same object as
    /// `dependency`. Returns whether anything was removed.
    pub fn remove_dependency(&self, dependency: &Arc<dyn Dependency>) -> bool {
        let mut dependencies = self.lock_dependencies();
        let target = Arc::as_ptr(dependency);
        match dependencies
            .iter()
            .position(|d| std::ptr::addr_eq(Arc::as_ptr(d), target))
        {
            Some(index) => {
                dependencies.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains_dependency_with_name(&self, name: &str) -> bool {
        self.lock_dependencies().iter().any(|d| d.name() == name)
    }

    /// Attached dependencies in attachment order.
    pub fn dependencies(&self) -> Vec<Arc<dyn Dependency>> {
        self.lock_dependencies().clone()
    }

    // ---- lifecycle --------------------------------------------------------

    /// Idle -> Pending, then resolve dependencies.
    ///
    /// A task without dependencies (or whose dependencies are all active
    /// already) is Active by the time this returns.
    pub fn start(&self) -> Result<(), TaskitError> {
        self.transition(TaskStatus::Pending)?;
        self.check_dependencies();
        Ok(())
    }

    /// Pick dependency resolution back up for a task that is already Pending,
    /// e.g. one restored from a persisted store. Callbacks parked on
    /// dependencies live in memory only, so nothing else would wake it.
    ///
    /// No-op for any other status. Calling it on a task that is already
    /// waiting parks at most one more callback; extra wake-ups just re-scan.
    pub fn resume(&self) {
        self.check_dependencies();
    }

    /// Active -> Completed.
    pub fn complete(&self) -> Result<(), TaskitError> {
        self.transition(TaskStatus::Completed)
    }

    /// Any non-archived status -> Archived. The task is evicted from its
    /// manager and this handle becomes detached.
    pub fn archive(&self) -> Result<(), TaskitError> {
        self.transition(TaskStatus::Archived)
    }

    fn transition(&self, to: TaskStatus) -> Result<(), TaskitError> {
        let id = self.inner.id;
        let manager = self
            .inner
            .manager
            .upgrade()
            .ok_or(TaskitError::Detached(id))?;

        let from = manager.status(id);
        if !from.can_transition_to(to) {
            tracing::warn!("task {id}: cannot move from {from} to {to}");
            return Err(TaskitError::IllegalTransition {
                task_id: id,
                from,
                to,
            });
        }
        if self.inner.detached.load(Ordering::SeqCst) {
            tracing::warn!("task {id}: handle is detached, ignoring {from} -> {to}");
            return Err(TaskitError::Detached(id));
        }

        // Store write, manager-wide post and (for Archived) eviction happen
        // in there; the task's own listeners hear about it afterwards.
        manager.set_task_status(id, to);
        drop(manager);
        tracing::debug!("task {id}: {from} -> {to}");

        self.inner.events.post(&to, self);
        Ok(())
    }

    /// Scan dependencies in attachment order. Stop at the first inactive one
    /// and wait for its next activation, which re-runs the whole scan. When
    /// every dependency is active, promote Pending -> Active.
    ///
    /// Only runs for a live, Pending task. Archiving a task therefore turns
    /// every callback still parked on a dependency into a no-op.
    fn check_dependencies(&self) {
        let _report = ScanReport(self);

        if self.is_detached() || self.status() != TaskStatus::Pending {
            return;
        }

        for dependency in self.dependencies() {
            if dependency.is_active() {
                continue;
            }
            tracing::debug!(
                "task {}: waiting on dependency '{}'",
                self.inner.id,
                dependency.name()
            );
            let weak = Arc::downgrade(&self.inner);
            dependency.once_active(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Task { inner }.check_dependencies();
                }
            }));
            return;
        }

        if let Err(err) = self.transition(TaskStatus::Active) {
            tracing::warn!("task {}: activation rejected: {err}", self.inner.id);
        }
    }

    fn lock_dependencies(&self) -> MutexGuard<'_, Vec<Arc<dyn Dependency>>> {
        self.inner
            .dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_detached(&self) {
        self.inner.detached.store(true, Ordering::SeqCst);
    }
}

/// Tells diagnostics that a dependency scan ran, even when the scan unwinds
/// because a status handler panicked.
struct ScanReport<'a>(&'a Task);

impl Drop for ScanReport<'_> {
    fn drop(&mut self) {
        let task = self.0;
        if let Some(manager) = task.inner.manager.upgrade()
            && let Some(diagnostics) = manager.diagnostics()
        {
            diagnostics.dependencies_checked(&TaskRef {
                manager_id: manager.id(),
                task_id: task.inner.id,
            });
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.id.fmt(f)
    }
}
