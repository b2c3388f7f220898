//! Domain model (ids, lifecycle status, errors).

pub mod errors;
pub mod ids;
pub mod status;

pub use self::errors::{ParseTaskStatusError, TaskitError};
pub use self::ids::{ManagerId, TaskId};
pub use self::status::TaskStatus;
