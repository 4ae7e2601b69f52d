//! Builds [`NormalizationContext`] values and owns the process-wide parent-context
//! cache (§4.3, §5).
//!
//! The cache mirrors the `RwLock<HashMap<..>>` shape the teacher's own
//! `ai::templates::engine::TemplateEngine` used for its template-compilation
//! cache: reads take a read lock and clone out a snapshot, writes take a
//! write lock.
//! Only the workflow owning a cache key is expected to write it; other
//! workflows only ever read keys scoped to their own `workflow_exec_id`.

use super::config::{TaskConfig, WorkflowConfig};
use super::context::NormalizationContext;
use super::env_merger::merge_env;
use super::ids::WorkflowExecID;
use super::state::WorkflowState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type CacheKey = (WorkflowExecID, String);

#[derive(Debug, Default)]
pub struct ContextBuilder {
    parent_cache: Arc<RwLock<HashMap<CacheKey, Arc<TaskConfig>>>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached parent context. Idempotent; the durable host calls
    /// this exactly once, at workflow start.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.parent_cache.write() {
            cache.clear();
        }
    }

    fn cached_parent(&self, key: &CacheKey) -> Option<Arc<TaskConfig>> {
        self.parent_cache.read().ok()?.get(key).cloned()
    }

    fn cache_parent(&self, key: CacheKey, parent: Arc<TaskConfig>) {
        if let Ok(mut cache) = self.parent_cache.write() {
            cache.insert(key, parent);
        }
    }

    /// Builds the [`NormalizationContext`] for `task_config` within `workflow_state`/`workflow_config`.
    pub fn build(
        &self,
        workflow_state: &WorkflowState,
        workflow_config: &WorkflowConfig,
        task_config: &TaskConfig,
        parent_task_id: Option<&str>,
    ) -> NormalizationContext {
        let task_configs = workflow_config.index_tasks();
        let children_index = build_children_index(&task_configs, workflow_config);

        let parent_config = parent_task_id.and_then(|parent_id| {
            let key = (workflow_state.workflow_exec_id.clone(), parent_id.to_string());
            if let Some(cached) = self.cached_parent(&key) {
                return Some((*cached).clone());
            }
            let found = task_configs.get(parent_id).cloned();
            if let Some(found) = &found {
                self.cache_parent(key, Arc::new(found.clone()));
            }
            found
        });

        let merged_env = merge_env(
            workflow_config.env.as_ref(),
            parent_config.as_ref().map(|p| &p.env),
            Some(&task_config.env),
        );

        let variables = build_variables(workflow_state, &merged_env, task_config);

        NormalizationContext {
            workflow_state: workflow_state.clone(),
            workflow_config: workflow_config.clone(),
            task_config: task_config.clone(),
            task_configs,
            parent_config,
            current_input: task_config.with.clone(),
            merged_env,
            variables,
            children_index,
            parent_task: parent_task_id.map(str::to_string),
        }
    }
}

/// `workflow` (id/input/output), `env`, and `task` (component metadata) root (§4.3).
fn build_variables(workflow_state: &WorkflowState, env: &super::config::EnvMap, task_config: &TaskConfig) -> Value {
    json!({
        "workflow": {
            "id": workflow_state.workflow_id,
            "input": workflow_state.input,
            "output": workflow_state.output,
        },
        "env": env,
        "task": {
            "id": task_config.id,
            "type": task_config.resolved_type(),
            "with": task_config.with,
            "agent": task_config.agent,
            "tool": task_config.tool,
            "action": task_config.action,
        },
    })
}

fn build_children_index(
    task_configs: &HashMap<String, TaskConfig>,
    workflow_config: &WorkflowConfig,
) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for task in &workflow_config.tasks {
        collect_children(task, &mut index);
    }
    // ensure every indexed task has an (possibly empty) entry for lookups via children_of
    for id in task_configs.keys() {
        index.entry(id.clone()).or_default();
    }
    index
}

fn collect_children(task: &TaskConfig, index: &mut HashMap<String, Vec<String>>) {
    let mut children = Vec::new();
    for child in &task.tasks {
        children.push(child.id.clone());
    }
    if let Some(inner) = &task.task {
        children.push(inner.id.clone());
    }
    if let Some(processor) = &task.processor {
        children.push(processor.id.clone());
    }
    index.insert(task.id.clone(), children);
    for child in &task.tasks {
        collect_children(child, index);
    }
    if let Some(inner) = &task.task {
        collect_children(inner, index);
    }
    if let Some(processor) = &task.processor {
        collect_children(processor, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::ids::OrgID;

    fn workflow_state() -> WorkflowState {
        WorkflowState::new("wf", OrgID::new(), json!({"x": 1}))
    }

    #[test]
    fn build_seeds_workflow_env_and_task_sections() {
        let builder = ContextBuilder::new();
        let wf_state = workflow_state();
        let mut wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![], env: None, schedule: None, opts: None };
        let mut task = TaskConfig::new("t1");
        task.env.insert("FOO".to_string(), "bar".to_string());
        wf_config.tasks.push(task.clone());

        let ctx = builder.build(&wf_state, &wf_config, &task, None);
        assert_eq!(ctx.variables["workflow"]["id"], json!("wf"));
        assert_eq!(ctx.variables["task"]["id"], json!("t1"));
        assert_eq!(ctx.merged_env.get("FOO").unwrap(), "bar");
    }

    #[test]
    fn parent_context_is_cached_across_builds() {
        let builder = ContextBuilder::new();
        let wf_state = workflow_state();
        let mut parent = TaskConfig::new("parent");
        let child = TaskConfig::new("child");
        parent.tasks.push(child.clone());
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![parent.clone()], env: None, schedule: None, opts: None };

        let first = builder.build(&wf_state, &wf_config, &child, Some("parent"));
        assert_eq!(first.parent_config.as_ref().unwrap().id, "parent");
        let key = (wf_state.workflow_exec_id.clone(), "parent".to_string());
        assert!(builder.cached_parent(&key).is_some());

        builder.clear_cache();
        assert!(builder.cached_parent(&key).is_none());
    }

    #[test]
    fn children_index_covers_nested_tasks() {
        let builder = ContextBuilder::new();
        let wf_state = workflow_state();
        let mut parent = TaskConfig::new("parent");
        parent.tasks.push(TaskConfig::new("child"));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![parent.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &parent, None);
        assert_eq!(ctx.children_of("parent"), &["child".to_string()]);
        assert!(ctx.children_of("child").is_empty());
    }
}
