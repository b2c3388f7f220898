//! StatusStore port - the source of truth for task status.
//!
//! The store only maps task id -> status. Live `Task` objects are a cache
//! kept by the manager; everything authoritative goes through here, including
//! ids that were never materialized in this process.

use crate::domain::{TaskId, TaskStatus};

/// Persistence contract for task status.
///
/// # Contract
/// - Ids never written read as [`TaskStatus::Idle`].
/// - A write is visible to the next read from the same process.
/// - Any backend works (memory, file, embedded DB, remote) as long as the
///   two rules above hold.
pub trait StatusStore: Send {
    /// Current status of `task_id`, `Idle` when unknown.
    fn status(&self, task_id: TaskId) -> TaskStatus;

    /// Record `status` for `task_id`.
    fn set_status(&mut self, task_id: TaskId, status: TaskStatus);

    /// Every id the store has a record for.
    fn task_ids(&self) -> Vec<TaskId>;
}

impl<S: StatusStore + ?Sized> StatusStore for Box<S> {
    fn status(&self, task_id: TaskId) -> TaskStatus {
        (**self).status(task_id)
    }

    fn set_status(&mut self, task_id: TaskId, status: TaskStatus) {
        (**self).set_status(task_id, status);
    }

    fn task_ids(&self) -> Vec<TaskId> {
        (**self).task_ids()
    }
}
