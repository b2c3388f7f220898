//! Domain identifiers (strongly-typed IDs).
//!
//! - [`TaskId`]: caller-chosen signed integer, unique within one manager.
//!   Quest tables, onboarding steps and pipeline stages all come with their
//!   own numbering (negative values included), so the engine never allocates
//!   task ids itself.
//! - [`ManagerId`]: opaque ULID assigned when a manager is built. Only the
//!   diagnostics registry uses it, to find a manager again without owning it.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a task within its manager.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque reference identity of a task manager.
///
/// ULIDs sort by creation time, so listing managers by id also lists them in
/// the order they were built.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagerId(Ulid);

impl ManagerId {
    /// Allocate a fresh id.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manager-{}", self.0)
    }
}
