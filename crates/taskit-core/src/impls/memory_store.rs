//! InMemoryStatusStore - reference StatusStore backed by a map.
//!
//! The map is ordered so `task_ids()` and the JSON form are stable. The
//! store is serde-serializable as a plain `{ "<id>": "<status>" }` object,
//! which is how the CLI carries state between runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{TaskId, TaskStatus};
use crate::ports::StatusStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryStatusStore {
    statuses: BTreeMap<TaskId, TaskStatus>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Recorded entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, TaskStatus)> + '_ {
        self.statuses.iter().map(|(id, status)| (*id, *status))
    }
}

impl StatusStore for InMemoryStatusStore {
    fn status(&self, task_id: TaskId) -> TaskStatus {
        self.statuses.get(&task_id).copied().unwrap_or_default()
    }

    fn set_status(&mut self, task_id: TaskId, status: TaskStatus) {
        self.statuses.insert(task_id, status);
    }

    fn task_ids(&self) -> Vec<TaskId> {
        self.statuses.keys().copied().collect()
    }
}

impl FromIterator<(TaskId, TaskStatus)> for InMemoryStatusStore {
    fn from_iter<I: IntoIterator<Item = (TaskId, TaskStatus)>>(iter: I) -> Self {
        Self {
            statuses: iter.into_iter().collect(),
        }
    }
}
