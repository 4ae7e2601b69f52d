//! Tool normalizer (§4.4): mirrors the agent path for `with`/`env`/config
//! fields; tools have no actions to address.

use super::super::context::NormalizationContext;
use super::super::env_merger::merge_env;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};
use serde_json::{json, Value};

const TOOL_DEFERRED: &[&str] = &["input", "output"];

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let mut normalized = evaluate_common(ctx, template, TOOL_DEFERRED)?;
    normalized.fields.insert("type".to_string(), json!("tool"));

    let tool_env = merge_env(ctx.workflow_config.env.as_ref(), Some(&ctx.task_config.env), None);
    normalized.fields.insert(
        "env".to_string(),
        serde_json::to_value(tool_env).unwrap_or(Value::Null),
    );

    if normalized.with.as_object().map(|m| m.is_empty()).unwrap_or(true) {
        normalized.with = Value::Object(ctx.current_input.clone());
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::config::{TaskConfig, WorkflowConfig};
    use crate::compozy::context_builder::ContextBuilder;
    use crate::compozy::ids::OrgID;
    use crate::compozy::state::WorkflowState;
    use serde_json::json;

    #[test]
    fn stamps_tool_type_and_merges_env() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut tool_task = TaskConfig::new("t");
        tool_task.tool = Some("calculator".to_string());
        tool_task.env.insert("PRECISION".to_string(), "2".to_string());
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![tool_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &tool_task, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.fields["type"], json!("tool"));
        assert_eq!(normalized.fields["env"]["PRECISION"], json!("2"));
    }
}
