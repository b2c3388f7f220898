//! Runs a scenario against a fresh task manager and reports the outcome.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use taskit_core::app::ManagerSnapshot;
use taskit_core::{
    Dependency, Diagnostics, InMemoryStatusStore, TaskId, TaskManager, TaskStatus, TaskitError,
    ToggleDependency,
};

use crate::scenario::{Scenario, Step};

/// Result of one scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,
    pub snapshot: ManagerSnapshot,
    #[serde(skip)]
    pub store: InMemoryStatusStore,
}

/// Drive `scenario` to the end.
///
/// Rejected steps are recorded and the run carries on; only a broken
/// scenario (or a manager that vanished) aborts it.
pub fn run(scenario: &Scenario, store: InMemoryStatusStore) -> Result<RunReport> {
    let restored_pending: HashSet<TaskId> = store
        .iter()
        .filter(|(_, status)| *status == TaskStatus::Pending)
        .map(|(id, _)| id)
        .collect();

    let diagnostics = Arc::new(Diagnostics::new());
    diagnostics.on_dependencies_checked(|task| {
        tracing::debug!("dependencies checked for task {}", task.task_id);
    });
    let manager = TaskManager::builder(scenario.manager.as_str())
        .store(store)
        .diagnostics(Arc::clone(&diagnostics))
        .build();

    let dependencies: HashMap<&str, Arc<ToggleDependency>> = scenario
        .dependencies
        .iter()
        .map(|spec| {
            let dependency = ToggleDependency::shared(spec.name.as_str());
            dependency.set_active(spec.active);
            (spec.name.as_str(), dependency)
        })
        .collect();

    for spec in &scenario.tasks {
        let task = match manager.ensure_task(spec.id) {
            Ok(task) => task,
            Err(TaskitError::Archived(id)) => {
                tracing::info!("task {id} is already archived; skipping setup");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        for name in &spec.dependencies {
            let dependency = lookup(&dependencies, name)?;
            task.add_dependency(Arc::clone(dependency) as Arc<dyn Dependency>);
        }
        // 前回の実行で Pending のまま保存されたタスクは、ここで待機を再開する
        if restored_pending.contains(&spec.id) {
            tracing::debug!("task {}: resuming from stored pending status", spec.id);
            task.resume();
        }
    }

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for step in &scenario.steps {
        let result = match step {
            Step::Start(id) => manager.ensure_task(*id).and_then(|task| task.start()),
            Step::Complete(id) => manager.ensure_task(*id).and_then(|task| task.complete()),
            Step::Archive(id) => manager.archive_task(*id),
            Step::Activate(name) => {
                lookup(&dependencies, name)?.set_active(true);
                Ok(())
            }
            Step::Deactivate(name) => {
                lookup(&dependencies, name)?.set_active(false);
                Ok(())
            }
        };
        steps.push(StepOutcome {
            step: step.to_string(),
            error: result.err().map(|err| err.to_string()),
        });
    }

    let snapshot = diagnostics
        .snapshot(manager.id())
        .ok_or_else(|| anyhow!("manager '{}' is no longer registered", manager.name()))?;
    let store = manager
        .task_ids()
        .into_iter()
        .map(|id| (id, manager.task_status(id)))
        .collect();

    Ok(RunReport {
        steps,
        snapshot,
        store,
    })
}

fn lookup<'a>(
    dependencies: &'a HashMap<&str, Arc<ToggleDependency>>,
    name: &str,
) -> Result<&'a Arc<ToggleDependency>> {
    dependencies
        .get(name)
        .ok_or_else(|| anyhow!("unknown dependency '{name}'"))
}

/// Load a store snapshot; a missing file means an empty store.
pub fn load_store(path: &Path) -> Result<InMemoryStatusStore> {
    if !path.exists() {
        return Ok(InMemoryStatusStore::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read store {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse store {}", path.display()))
}

pub fn save_store(path: &Path, store: &InMemoryStatusStore) -> Result<()> {
    let json = serde_json::to_string_pretty(store).context("failed to encode store")?;
    std::fs::write(path, json).with_context(|| format!("failed to write store {}", path.display()))
}

/// Human-readable report.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let snapshot = &report.snapshot;
    let _ = writeln!(out, "manager {} ({})", snapshot.name, snapshot.id);

    if !report.steps.is_empty() {
        let _ = writeln!(out, "steps:");
        for (index, outcome) in report.steps.iter().enumerate() {
            match &outcome.error {
                None => {
                    let _ = writeln!(out, "  {:>3}. {}: ok", index + 1, outcome.step);
                }
                Some(err) => {
                    let _ = writeln!(out, "  {:>3}. {}: rejected: {err}", index + 1, outcome.step);
                }
            }
        }
    }

    let _ = writeln!(out, "tasks:");
    for task in &snapshot.tasks {
        let _ = write!(out, "  {:>5}  {}", task.task_id, task.status);
        if !task.dependencies.is_empty() {
            let deps: Vec<String> = task
                .dependencies
                .iter()
                .map(|d| format!("{}={}", d.name, if d.active { "on" } else { "off" }))
                .collect();
            let _ = write!(out, "  [{}]", deps.join(", "));
        }
        out.push('\n');
    }
    out
}
