//! Transition normalizer (§4.4): evaluates a `on_success`/`on_error` block's
//! `with` (treated as that transition's current input) against the owning
//! task's context.

use super::super::config::TransitionConfig;
use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use serde_json::Value;

pub fn normalize(
    transition: &TransitionConfig,
    ctx: &NormalizationContext,
    template: &TemplateEngine,
) -> Result<TransitionConfig> {
    let with = match &transition.with {
        Some(map) => {
            let evaluated = template.parse_any(&Value::Object(map.clone()), &ctx.variables)?;
            evaluated.as_object().cloned()
        }
        None => None,
    };
    Ok(TransitionConfig { next: transition.next.clone(), stop: transition.stop, fail: transition.fail, with })
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
    fn evaluates_transition_with_block() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"id": "abc"}));
        let task = TaskConfig::new("t");
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![task.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &task, None);

        let mut with = serde_json::Map::new();
        with.insert("ref_id".to_string(), json!("{{workflow.input.id}}"));
        let transition = TransitionConfig { next: Some("next_task".to_string()), stop: false, fail: false, with: Some(with) };

        let normalized = normalize(&transition, &ctx, &template).unwrap();
        assert_eq!(normalized.with.unwrap()["ref_id"], json!("abc"));
    }
}
