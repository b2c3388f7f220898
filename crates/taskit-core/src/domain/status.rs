//! Task lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseTaskStatusError;

/// Lifecycle status of a task.
///
/// # State transitions
/// - Idle -> Pending: `start()`
/// - Pending -> Active: every dependency reports active
/// - Active -> Completed: `complete()`
/// - any non-archived status -> Archived: `archive()`
///
/// Archived is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet. Unseen ids read as Idle.
    #[default]
    Idle,

    /// Started, waiting for at least one dependency.
    Pending,

    /// Every dependency was satisfied.
    Active,

    /// Finished by the caller.
    Completed,

    /// Retired permanently (e.g. the reward was claimed).
    Archived,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Idle,
        TaskStatus::Pending,
        TaskStatus::Active,
        TaskStatus::Completed,
        TaskStatus::Archived,
    ];

    /// Canonical string form, shared by `Display`, serde and parsing.
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }

    /// Is this a terminal status (no further transitions)?
    pub const fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Archived)
    }

    /// Are dependency details still worth reporting for this status?
    ///
    /// Once a task is completed or archived its dependencies no longer gate
    /// anything.
    pub const fn tracks_dependencies(self) -> bool {
        !matches!(self, TaskStatus::Completed | TaskStatus::Archived)
    }

    /// Is `self -> target` a legal lifecycle step?
    pub const fn can_transition_to(self, target: TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Idle, TaskStatus::Pending)
                | (TaskStatus::Pending, TaskStatus::Active)
                | (TaskStatus::Active, TaskStatus::Completed)
                | (
                    TaskStatus::Idle
                        | TaskStatus::Pending
                        | TaskStatus::Active
                        | TaskStatus::Completed,
                    TaskStatus::Archived
                )
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "idle" => Ok(TaskStatus::Idle),
            "pending" => Ok(TaskStatus::Pending),
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "archived" => Ok(TaskStatus::Archived),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::try_from(s)
    }
}
