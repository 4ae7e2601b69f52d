//! Wait normalizer (§4.4): evaluates `wait_for`/`on_timeout`, inherits `cwd`/
//! `file_path` into an attached processor sub-task when it omits them, and
//! exposes `normalize_with_signal` for re-evaluating `wait_for` once a signal
//! payload has arrived.

use super::super::config::TaskConfig;
use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};
use serde_json::json;

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let mut normalized = evaluate_common(ctx, template, &["processor"])?;
    if let Some(processor) = &ctx.task_config.processor {
        let inherited = inherit_cwd_and_file_path(&ctx.task_config, processor);
        normalized
            .fields
            .insert("processor_cwd".to_string(), json!(inherited.0));
        normalized
            .fields
            .insert("processor_file_path".to_string(), json!(inherited.1));
    }
    Ok(normalized)
}

/// Re-evaluates `wait_for` with `.signal` bound to the received payload, so a
/// template like `{{ signal.event_id }}` resolves once the signal is in hand.
pub fn normalize_with_signal(
    ctx: &NormalizationContext,
    template: &TemplateEngine,
    signal: &serde_json::Value,
) -> Result<Option<String>> {
    let Some(wait_for) = &ctx.task_config.wait_for else {
        return Ok(None);
    };
    let mut variables = ctx.variables.clone();
    if let Some(root) = variables.as_object_mut() {
        root.insert("signal".to_string(), signal.clone());
    }
    Ok(Some(template.parse_string_only(wait_for, &variables)?))
}

fn inherit_cwd_and_file_path(parent: &TaskConfig, processor: &TaskConfig) -> (Option<String>, Option<String>) {
    let cwd = processor.cwd.clone().or_else(|| parent.cwd.clone());
    let file_path = processor.file_path.clone().or_else(|| parent.file_path.clone());
    (cwd, file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::config::WorkflowConfig;
    use crate::compozy::context_builder::ContextBuilder;
    use crate::compozy::ids::OrgID;
    use crate::compozy::state::WorkflowState;
    use serde_json::json;

    #[test]
    fn processor_inherits_parent_cwd_when_absent() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut wait_task = TaskConfig::new("w");
        wait_task.task_type = Some("wait".to_string());
        wait_task.cwd = Some("/parent".to_string());
        wait_task.processor = Some(Box::new(TaskConfig::new("proc")));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![wait_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &wait_task, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.fields["processor_cwd"], json!("/parent"));
    }

    #[test]
    fn normalize_with_signal_exposes_signal_payload() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let mut wait_task = TaskConfig::new("w");
        wait_task.task_type = Some("wait".to_string());
        wait_task.wait_for = Some("{{signal.event_id}}".to_string());
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![wait_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &wait_task, None);

        let resolved = normalize_with_signal(&ctx, &template, &json!({"type": "timeout", "event_id": "sig-123"})).unwrap();
        assert_eq!(resolved.as_deref(), Some("sig-123"));
    }
}
