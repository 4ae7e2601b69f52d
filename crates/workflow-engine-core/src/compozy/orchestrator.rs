//! Config Orchestrator (§4.7): the public façade the durable host drives.
//!
//! Thin composition over [`super::context_builder::ContextBuilder`],
//! [`super::factory::Factory`], [`super::normalizers`], and
//! [`super::output_transformer`] — no algorithm lives here that isn't already
//! implemented in one of those modules; this type only sequences the calls.

use super::collection_expander;
use super::config::{ActionConfig, InputMap, TaskConfig, TransitionConfig, WorkflowConfig};
use super::context::NormalizationContext;
use super::error::Result;
use super::factory::Factory;
use super::normalizers::{self, NormalizedTask};
use super::output_transformer;
use super::state::WorkflowState;
use serde_json::Value;
use std::sync::Arc;

pub struct Orchestrator {
    factory: Arc<Factory>,
}

impl Orchestrator {
    pub fn new(factory: Arc<Factory>) -> Self {
        Self { factory }
    }

    /// `NormalizeTask`: builds the indexed context and dispatches to the
    /// type-specific normalizer.
    pub fn normalize_task(
        &self,
        workflow_state: &WorkflowState,
        workflow_config: &WorkflowConfig,
        task_config: &TaskConfig,
        parent_task_id: Option<&str>,
    ) -> Result<(NormalizationContext, NormalizedTask)> {
        let ctx = self.factory.context_builder.build(workflow_state, workflow_config, task_config, parent_task_id);
        let normalized = self.factory.normalize(&ctx)?;
        Ok((ctx, normalized))
    }

    /// `NormalizeAgentComponent`: wraps agent normalization, merging the
    /// task's `with` on top of the referenced component's own `with` (task
    /// values win, matching the task-over-component precedence used elsewhere).
    pub fn normalize_agent_component(
        &self,
        ctx: &NormalizationContext,
        component_with: &InputMap,
    ) -> Result<NormalizedTask> {
        let mut merged = component_with.clone();
        for (k, v) in &ctx.task_config.with {
            merged.insert(k.clone(), v.clone());
        }
        let mut merged_ctx = ctx.clone();
        merged_ctx.current_input = merged;
        normalizers::agent::normalize(&merged_ctx, &self.factory.template_engine)
    }

    /// `NormalizeToolComponent`: same input-merge contract as the agent path.
    pub fn normalize_tool_component(
        &self,
        ctx: &NormalizationContext,
        component_with: &InputMap,
    ) -> Result<NormalizedTask> {
        let mut merged = component_with.clone();
        for (k, v) in &ctx.task_config.with {
            merged.insert(k.clone(), v.clone());
        }
        let mut merged_ctx = ctx.clone();
        merged_ctx.current_input = merged;
        normalizers::tool::normalize(&merged_ctx, &self.factory.template_engine)
    }

    /// `NormalizeAgentAction`: normalizes the one action `taskConfig.action`
    /// addresses, given the caller-resolved `ActionConfig` (the agent's
    /// action list lookup happens outside this crate, same as how the
    /// agent/tool component's own `with` is handed in above).
    pub fn normalize_agent_action(&self, ctx: &NormalizationContext, action: &ActionConfig) -> Result<NormalizedTask> {
        normalizers::agent::normalize_action(ctx, &self.factory.template_engine, action)
    }

    pub fn normalize_success_transition(&self, ctx: &NormalizationContext) -> Result<Option<TransitionConfig>> {
        Ok(normalizers::normalize_transitions(ctx, &self.factory.template_engine)?.0)
    }

    pub fn normalize_error_transition(&self, ctx: &NormalizationContext) -> Result<Option<TransitionConfig>> {
        Ok(normalizers::normalize_transitions(ctx, &self.factory.template_engine)?.1)
    }

    /// `NormalizeTaskOutput`: applies the output transformer for `ctx`'s task.
    pub fn normalize_task_output(&self, ctx: &NormalizationContext, output: Value) -> Result<Value> {
        let outputs_config = if ctx.task_config.outputs.is_empty() { None } else { Some(&ctx.task_config.outputs) };
        output_transformer::transform_output(&self.factory.template_engine, output, outputs_config, ctx)
    }

    /// `NormalizeTaskWithSignal`: wait-task normalization carrying a signal value.
    pub fn normalize_task_with_signal(
        &self,
        ctx: &NormalizationContext,
        signal: &Value,
    ) -> Result<Option<String>> {
        normalizers::wait::normalize_with_signal(ctx, &self.factory.template_engine, signal)
    }

    /// Expands a collection task's children (§4.8), delegating to the expander.
    pub fn expand_collection(&self, ctx: &NormalizationContext) -> Result<Vec<TaskConfig>> {
        collection_expander::expand(ctx, &self.factory.template_engine)
    }

    /// `ClearCache()`: invoked once by the durable host at workflow start.
    pub fn clear_cache(&self) {
        self.factory.context_builder.clear_cache();
    }

    /// The underlying factory, for callers that need the task-type →
    /// response-handler dispatch (`Factory::create_response_handler`).
    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::ids::OrgID;
    use serde_json::json;

    #[test]
    fn normalize_task_dispatches_through_factory() {
        let orchestrator = Orchestrator::new(Arc::new(Factory::new()));
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"greeting": "hi"}));
        let mut task = TaskConfig::new("t1");
        task.with.insert("msg".to_string(), json!("{{workflow.input.greeting}}"));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![task.clone()], env: None, schedule: None, opts: None };

        let (_ctx, normalized) = orchestrator.normalize_task(&wf_state, &wf_config, &task, None).unwrap();
        assert_eq!(normalized.with["msg"], json!("hi"));
    }

    #[test]
    fn normalize_task_output_passes_through_without_outputs_config() {
        let orchestrator = Orchestrator::new(Arc::new(Factory::new()));
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let task = TaskConfig::new("t1");
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![task.clone()], env: None, schedule: None, opts: None };
        let ctx = orchestrator.factory.context_builder.build(&wf_state, &wf_config, &task, None);

        let output = json!({"a": 1});
        let result = orchestrator.normalize_task_output(&ctx, output.clone()).unwrap();
        assert_eq!(result, output);
    }

    #[test]
    fn clear_cache_is_idempotent() {
        let orchestrator = Orchestrator::new(Arc::new(Factory::new()));
        orchestrator.clear_cache();
        orchestrator.clear_cache();
    }
}
