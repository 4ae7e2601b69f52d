//! Basic task normalizer (§4.4): evaluates the whole config map except `with`,
//! which is evaluated separately and exposed on its own.

use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let mut normalized = evaluate_common(ctx, template, &[])?;
    normalized.outputs = template.parse_any(
        &serde_json::Value::Object(ctx.task_config.outputs.clone()),
        &ctx.variables,
    )?;
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
    fn evaluates_with_and_outputs() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"greeting": "hi"}));
        let mut task = TaskConfig::new("t1");
        task.with.insert("msg".to_string(), json!("{{workflow.input.greeting}}"));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &task, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.with["msg"], json!("hi"));
    }
}
