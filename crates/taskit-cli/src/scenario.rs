//! Scenario files: a manager, its dependencies and tasks, and a script of
//! steps to drive them.
//!
//! ```json
//! {
//!   "manager": "quests",
//!   "dependencies": [{ "name": "gate" }, { "name": "key", "active": true }],
//!   "tasks": [{ "id": 1, "dependencies": ["gate", "key"] }],
//!   "steps": [{ "start": 1 }, { "activate": "gate" }, { "complete": 1 }]
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use taskit_core::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub manager: String,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    pub name: String,
    /// Initial state.
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    /// Dependency names, attached in this order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start(TaskId),
    Activate(String),
    Deactivate(String),
    Complete(TaskId),
    /// Any id, declared or not.
    Archive(TaskId),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Start(id) => write!(f, "start {id}"),
            Step::Activate(name) => write!(f, "activate {name}"),
            Step::Deactivate(name) => write!(f, "deactivate {name}"),
            Step::Complete(id) => write!(f, "complete {id}"),
            Step::Archive(id) => write!(f, "archive {id}"),
        }
    }
}

impl Scenario {
    /// Read and validate a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        scenario
            .validate()
            .with_context(|| format!("invalid scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// Reject anything that would make a run meaningless before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.manager.trim().is_empty() {
            bail!("manager name must not be empty");
        }

        let mut names = HashSet::new();
        for dependency in &self.dependencies {
            if !names.insert(dependency.name.as_str()) {
                bail!("dependency '{}' is declared twice", dependency.name);
            }
        }

        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id) {
                bail!("task {} is declared twice", task.id);
            }
            for name in &task.dependencies {
                if !names.contains(name.as_str()) {
                    bail!("task {} depends on unknown dependency '{name}'", task.id);
                }
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            match step {
                Step::Start(id) | Step::Complete(id) if !ids.contains(id) => {
                    bail!("step {number} ({step}): task {id} is not declared");
                }
                Step::Activate(name) | Step::Deactivate(name) if !names.contains(name.as_str()) => {
                    bail!("step {number} ({step}): unknown dependency '{name}'");
                }
                _ => {}
            }
        }
        Ok(())
    }
}
