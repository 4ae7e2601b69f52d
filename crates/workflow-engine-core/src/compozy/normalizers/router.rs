//! Router normalizer (§4.4): evaluates the routing `condition` only; the
//! `condition → next task id` lookup itself happens at response-handler time.

use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    evaluate_common(ctx, template, &["routes"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::config::{RouteTable, TaskConfig, WorkflowConfig};
    use crate::compozy::context_builder::ContextBuilder;
    use crate::compozy::ids::OrgID;
    use crate::compozy::state::WorkflowState;
    use serde_json::json;

    #[test]
    fn evaluates_condition_but_not_routes() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"flag": "yes"}));
        let mut router = TaskConfig::new("r");
        router.task_type = Some("router".to_string());
        router.condition = Some("{{workflow.input.flag}}".to_string());
        let mut routes = RouteTable::new();
        routes.insert("yes".to_string(), "next".to_string());
        router.routes = Some(routes);
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![router.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &router, None);

        let normalized = normalize(&ctx, &template).unwrap();
        assert_eq!(normalized.fields["condition"], json!("yes"));
    }
}
