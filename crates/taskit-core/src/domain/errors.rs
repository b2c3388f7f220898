//! Errors - error types for the task engine.

use thiserror::Error;

use super::{TaskId, TaskStatus};

/// Errors returned by task and manager operations.
///
/// `IllegalTransition` is an ordinary "no" from the state machine: the task
/// is left untouched and the caller decides what to do. `Archived` and
/// `Detached` mean the caller is holding on to something that is gone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskitError {
    #[error("task {task_id} cannot move from {from} to {to}")]
    IllegalTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task {0} has been archived")]
    Archived(TaskId),

    #[error("task {0} is detached from its manager")]
    Detached(TaskId),
}

/// Error returned while parsing a task status from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);
