//! App - アプリケーション層
//!
//! domain と ports を組み合わせて、タスクのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **TaskManager**: タスクの生成・検索・アーカイブ、マネージャ単位の通知
//! - **Task**: 状態遷移（Idle → Pending → Active → Completed / Archived）と依存解決
//! - **Diagnostics**: マネージャとタスクの読み取り専用ビュー（デバッグ用）

pub mod diagnostics;
pub mod manager;
pub mod task;

// 主要な型を再エクスポート
pub use self::diagnostics::{
    DependencyInfo, Diagnostics, ManagerInfo, ManagerSnapshot, TaskRef, TaskSnapshot,
};
pub use self::manager::{TaskManager, TaskManagerBuilder};
pub use self::task::Task;
