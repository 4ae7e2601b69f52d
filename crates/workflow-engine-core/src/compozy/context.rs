//! Ephemeral per-task-operation normalization context (§3 NormalizationContext).

use super::config::{EnvMap, InputMap, TaskConfig, WorkflowConfig};
use super::state::WorkflowState;
use serde_json::Value;
use std::collections::HashMap;

/// Everything a [`super::normalizers`] function needs to resolve one task's
/// templated fields. Built fresh per task operation by
/// [`super::context_builder::ContextBuilder`]; never persisted, and mutated
/// only by the normalizer it is handed to.
#[derive(Debug, Clone)]
pub struct NormalizationContext {
    pub workflow_state: WorkflowState,
    pub workflow_config: WorkflowConfig,
    pub task_config: TaskConfig,
    pub task_configs: HashMap<String, TaskConfig>,
    pub parent_config: Option<TaskConfig>,
    pub current_input: InputMap,
    pub merged_env: EnvMap,
    pub variables: Value,
    pub children_index: HashMap<String, Vec<String>>,
    pub parent_task: Option<String>,
}

impl NormalizationContext {
    /// Looks up a sibling/ancestor task config by id.
    pub fn task(&self, id: &str) -> Option<&TaskConfig> {
        self.task_configs.get(id)
    }

    /// Direct children of `task_id`, in config order.
    pub fn children_of(&self, task_id: &str) -> &[String] {
        self.children_index.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
