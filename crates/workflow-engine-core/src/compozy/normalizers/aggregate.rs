//! Aggregate / signal / memory normalizer (§4.4): evaluates each component's
//! own small field set with the common `with`/deferred-field filter; none of
//! these three types carry type-specific nested task trees of their own.

use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    evaluate_common(ctx, template, &[])
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
    fn evaluates_signal_field() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"event": "done"}));
        let mut signal_task = TaskConfig::new("s");
        signal_task.task_type = Some("signal".to_string());
        signal_task.signal = Some("{{workflow.input.event}}".to_string());
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![signal_task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &signal_task, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.fields["signal"], json!("done"));
    }
}
