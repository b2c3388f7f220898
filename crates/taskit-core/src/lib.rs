//! taskit-core
//!
//! Dependency-gated task lifecycle engine.
//!
//! # モジュール構成
//! - **bus**: 同期 pub/sub（キーごとの購読、once、SubscriptionId による解除）
//! - **dependency**: Dependency trait と ToggleDependency
//! - **domain**: ドメインモデル（ids, status, errors）
//! - **ports**: 抽象化レイヤー（StatusStore）
//! - **impls**: 実装（InMemoryStatusStore）
//! - **app**: TaskManager / Task / Diagnostics
//!
//! ```
//! use std::sync::Arc;
//! use taskit_core::{Dependency, TaskId, TaskManager, TaskStatus, ToggleDependency};
//!
//! let manager = TaskManager::new("quests");
//! let gate = ToggleDependency::shared("gate");
//! let task = manager.ensure_task(TaskId::new(1)).unwrap();
//! task.add_dependency(gate.clone() as Arc<dyn Dependency>);
//!
//! task.start().unwrap();
//! assert_eq!(task.status(), TaskStatus::Pending);
//!
//! gate.set_active(true);
//! assert_eq!(task.status(), TaskStatus::Active);
//! ```

pub mod app;
pub mod bus;
pub mod dependency;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{Diagnostics, Task, TaskManager, TaskManagerBuilder};
pub use self::bus::{EventBus, SubscriptionId};
pub use self::dependency::{Dependency, ToggleDependency};
pub use self::domain::{ManagerId, TaskId, TaskStatus, TaskitError};
pub use self::impls::InMemoryStatusStore;
pub use self::ports::StatusStore;
