//! Declarative, immutable task & workflow configuration (the YAML-shaped input, §6.1).
//!
//! `WorkflowConfig`/`TaskConfig` are read-only during a run: the normalization
//! layer produces *derived* values (in [`super::context::NormalizationContext`])
//! rather than ever mutating these trees in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A loosely-typed environment map, e.g. `{"API_KEY": "..."}`.
pub type EnvMap = HashMap<String, String>;

/// A templated key/value input map, e.g. a task's `with:` block.
pub type InputMap = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Basic,
    Parallel,
    Collection,
    Router,
    Wait,
    Aggregate,
    Composite,
    Signal,
    Memory,
}

impl TaskType {
    /// Empty/unspecified type maps to `basic` (§4.6).
    pub fn from_config_str(s: Option<&str>) -> Option<Self> {
        match s {
            None | Some("") => Some(TaskType::Basic),
            Some("basic") => Some(TaskType::Basic),
            Some("parallel") => Some(TaskType::Parallel),
            Some("collection") => Some(TaskType::Collection),
            Some("router") => Some(TaskType::Router),
            Some("wait") => Some(TaskType::Wait),
            Some("aggregate") => Some(TaskType::Aggregate),
            Some("composite") => Some(TaskType::Composite),
            Some("signal") => Some(TaskType::Signal),
            Some("memory") => Some(TaskType::Memory),
            Some(_) => None,
        }
    }

    /// Whether this type defers output transformation until all children finalize (§4.10).
    pub fn defers_output_transform(&self) -> bool {
        matches!(self, TaskType::Collection | TaskType::Parallel | TaskType::Composite)
    }

    pub fn default_max_workers(&self) -> usize {
        match self {
            TaskType::Parallel => 4,
            TaskType::Collection => 10,
            TaskType::Composite => 1,
            _ => 1,
        }
    }
}

/// Fan-out completion strategy (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    WaitAll,
    FailFast,
    BestEffort,
    Race,
}

/// Resolved transition directive: advance to a named task, stop cleanly, or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction<'a> {
    Next(&'a str),
    Stop,
    Fail,
}

/// `{ next | stop | fail, with? }` transition descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub fail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with: Option<InputMap>,
}

impl TransitionConfig {
    /// Resolves the directive. `stop`/`fail` take precedence over `next`
    /// when multiple fields are set, since a transition that both stops and
    /// names a next task is a config error the normalizer should have caught.
    pub fn action(&self) -> TransitionAction<'_> {
        if self.fail {
            TransitionAction::Fail
        } else if self.stop {
            TransitionAction::Stop
        } else if let Some(next) = &self.next {
            TransitionAction::Next(next)
        } else {
            TransitionAction::Stop
        }
    }
}

/// A router's condition → next-task-id route table.
pub type RouteTable = HashMap<String, String>;

/// One action declared on an agent, addressed by `TaskConfig.action` (§4.4).
/// Carries its own `with` defaults and `prompt` template, both re-evaluated
/// against the task's merged input the same way an agent/tool component's
/// own `with` is (task-level values win).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(default)]
    pub with: InputMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Tree-shaped descriptor of a single task (§3 TaskConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default)]
    pub with: InputMap,
    #[serde(default)]
    pub env: EnvMap,
    #[serde(default)]
    pub outputs: InputMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<TransitionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<TransitionConfig>,

    // parallel / composite
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskConfig>,

    // collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Box<TaskConfig>>,

    // wait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<Box<TaskConfig>>,

    // router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<RouteTable>,

    // signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,

    // parallel / collection / composite strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl TaskConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: None,
            agent: None,
            tool: None,
            action: None,
            with: InputMap::new(),
            env: EnvMap::new(),
            outputs: InputMap::new(),
            on_success: None,
            on_error: None,
            tasks: Vec::new(),
            items: None,
            task: None,
            wait_for: None,
            on_timeout: None,
            processor: None,
            condition: None,
            routes: None,
            signal: None,
            strategy: None,
            max_workers: None,
            cwd: None,
            file_path: None,
        }
    }

    pub fn resolved_type(&self) -> Option<TaskType> {
        TaskType::from_config_str(self.task_type.as_deref())
    }

    /// Worker bound for this task's fan-out, treating non-positive overrides
    /// as "use default" (§4.8).
    pub fn resolved_max_workers(&self, task_type: TaskType) -> usize {
        match self.max_workers {
            Some(n) if n > 0 => n as usize,
            _ => task_type.default_max_workers(),
        }
    }

    pub fn resolved_strategy(&self) -> Strategy {
        self.strategy.unwrap_or_default()
    }
}

/// Top-level immutable workflow descriptor (§3 WorkflowConfig).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub id: String,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<Value>,
}

impl WorkflowConfig {
    /// Depth-first index of every task in the tree, keyed by task id, including
    /// nested parallel/collection/composite children and wait processors.
    pub fn index_tasks(&self) -> HashMap<String, TaskConfig> {
        let mut index = HashMap::new();
        for task in &self.tasks {
            index_task_recursive(task, &mut index);
        }
        index
    }
}

fn index_task_recursive(task: &TaskConfig, index: &mut HashMap<String, TaskConfig>) {
    index.insert(task.id.clone(), task.clone());
    for child in &task.tasks {
        index_task_recursive(child, index);
    }
    if let Some(inner) = &task.task {
        index_task_recursive(inner, index);
    }
    if let Some(processor) = &task.processor {
        index_task_recursive(processor, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_type_resolves_to_basic() {
        assert_eq!(TaskType::from_config_str(None), Some(TaskType::Basic));
        assert_eq!(TaskType::from_config_str(Some("")), Some(TaskType::Basic));
    }

    #[test]
    fn unknown_type_resolves_to_none() {
        assert_eq!(TaskType::from_config_str(Some("bogus")), None);
    }

    #[test]
    fn non_positive_max_workers_falls_back_to_default() {
        let mut cfg = TaskConfig::new("t1");
        cfg.max_workers = Some(0);
        assert_eq!(cfg.resolved_max_workers(TaskType::Parallel), 4);
        cfg.max_workers = Some(-3);
        assert_eq!(cfg.resolved_max_workers(TaskType::Collection), 10);
        cfg.max_workers = Some(7);
        assert_eq!(cfg.resolved_max_workers(TaskType::Parallel), 7);
    }

    #[test]
    fn index_tasks_covers_nested_trees() {
        let mut parent = TaskConfig::new("parent");
        let mut child = TaskConfig::new("child");
        child.task_type = Some("basic".to_string());
        parent.tasks.push(child);
        let wf = WorkflowConfig { id: "wf".to_string(), tasks: vec![parent], env: None, schedule: None, opts: None };
        let idx = wf.index_tasks();
        assert!(idx.contains_key("parent"));
        assert!(idx.contains_key("child"));
    }
}
