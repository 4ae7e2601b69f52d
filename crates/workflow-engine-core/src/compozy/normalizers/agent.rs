//! Agent normalizer (§4.4).
//!
//! Merges env across workflow/task/agent, defaults `current_input` to the
//! task's `with` block when none is provided, stamps `task.type = "agent"`,
//! and evaluates everything except the runtime-sensitive fields (`with`,
//! `actions`, `tools`, `input`, `output`), which are deferred to
//! [`reparse_input`] — called once the task tree has sibling outputs
//! available under `.tasks.*`.

use super::super::config::ActionConfig;
use super::super::context::NormalizationContext;
use super::super::env_merger::merge_env;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};
use serde_json::{json, Value};

const AGENT_DEFERRED: &[&str] = &["actions", "tools", "input", "output"];

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let mut normalized = evaluate_common(ctx, template, AGENT_DEFERRED)?;
    normalized.fields.insert("type".to_string(), json!("agent"));

    let agent_env = merge_env(ctx.workflow_config.env.as_ref(), Some(&ctx.task_config.env), None);
    normalized.fields.insert(
        "env".to_string(),
        serde_json::to_value(agent_env).unwrap_or(Value::Null),
    );

    if normalized.with.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        normalized.with = Value::Object(ctx.current_input.clone());
    }

    if let Some(action) = &ctx.task_config.action {
        normalized.fields.insert("action".to_string(), json!(action));
    }
    Ok(normalized)
}

/// Normalizes the one action addressed by `task_config.action` (§4.4):
/// merges the task's `with` over the action's own declared `with` (task
/// values win, same precedence `normalize_agent_component` uses for the
/// agent itself), and reparses the action's `prompt` template against the
/// merged input. `action` is the entry from the agent's action list keyed by
/// `task_config.action`; the caller resolves that lookup.
pub fn normalize_action(ctx: &NormalizationContext, template: &TemplateEngine, action: &ActionConfig) -> Result<NormalizedTask> {
    let mut merged = action.with.clone();
    for (k, v) in &ctx.task_config.with {
        merged.insert(k.clone(), v.clone());
    }
    let merged_value = Value::Object(merged.clone());
    let rendered_with = template.parse_any(&merged_value, &ctx.variables)?;

    let mut normalized = NormalizedTask::default();
    normalized.with = rendered_with;
    if let Some(prompt) = &action.prompt {
        let rendered_prompt = template.parse_any(&json!(prompt), &ctx.variables)?;
        normalized.fields.insert("prompt".to_string(), rendered_prompt);
    }
    Ok(normalized)
}

/// Runtime re-evaluation (`ReparseInput`): re-renders `with` against `full_context`,
/// which is expected to include `.tasks.*` sibling outputs unavailable at
/// normalization time.
pub fn reparse_input(
    ctx: &NormalizationContext,
    template: &TemplateEngine,
    full_context: &Value,
) -> Result<Value> {
    let with_value = Value::Object(ctx.task_config.with.clone());
    template.parse_any(&with_value, full_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::config::{TaskConfig, WorkflowConfig};
    use crate::compozy::context_builder::ContextBuilder;
    use crate::compozy::ids::OrgID;
    use crate::compozy::state::WorkflowState;

    #[test]
    fn defaults_current_input_to_with_when_empty() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut agent_task = TaskConfig::new("a");
        agent_task.agent = Some("assistant".to_string());
        agent_task.action = Some("summarize".to_string());
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![agent_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &agent_task, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.fields["type"], json!("agent"));
        assert_eq!(normalized.fields["action"], json!("summarize"));
    }

    #[test]
    fn normalize_action_merges_with_and_reparses_prompt() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut agent_task = TaskConfig::new("a");
        agent_task.agent = Some("assistant".to_string());
        agent_task.action = Some("summarize".to_string());
        agent_task.with.insert("topic".to_string(), json!("rust"));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![agent_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &agent_task, None);

        let mut action = crate::compozy::config::ActionConfig::default();
        action.with.insert("tone".to_string(), json!("formal"));
        action.prompt = Some("summarize {{task.with.topic}}".to_string());

        let normalized = normalize_action(&ctx, &template, &action).unwrap();
        assert_eq!(normalized.with["topic"], json!("rust"));
        assert_eq!(normalized.with["tone"], json!("formal"));
        assert_eq!(normalized.fields["prompt"], json!("summarize rust"));
    }

    #[test]
    fn reparse_input_uses_full_context_with_task_outputs() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut agent_task = TaskConfig::new("a");
        agent_task.with.insert("summary_of".to_string(), json!("{{tasks.prior.output.text}}"));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![agent_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &agent_task, None);

        let full_context = json!({"tasks": {"prior": {"output": {"text": "hello"}}}});
        let reparsed = reparse_input(&ctx, &template, &full_context).unwrap();
        assert_eq!(reparsed["summary_of"], json!("hello"));
    }
}
