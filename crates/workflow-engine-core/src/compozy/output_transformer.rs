//! Task output transformation against a task's `outputs` config (§4.5).

use super::config::InputMap;
use super::context::NormalizationContext;
use super::error::{CompozyError, Result};
use super::template::TemplateEngine;
use serde_json::Value;

/// Transforms `output` according to `outputs_config`.
///
/// Returns `output` unchanged when `outputs_config` is `None` or `output` is
/// `Value::Null`. For collection/parallel output (expected to carry an
/// `outputs` submap keyed by child id), a missing submap is treated as empty
/// rather than an error, so `{{ len output.outputs }}` evaluates to `0`.
pub fn transform_output(
    template: &TemplateEngine,
    output: Value,
    outputs_config: Option<&InputMap>,
    ctx: &NormalizationContext,
) -> Result<Value> {
    let Some(outputs_config) = outputs_config else {
        return Ok(output);
    };
    if output.is_null() {
        return Ok(output);
    }

    let mut variables = ctx.variables.clone();
    if let Some(root) = variables.as_object_mut() {
        root.insert("output".to_string(), output_with_empty_outputs_submap(&output));
    }

    let mut transformed = serde_json::Map::with_capacity(outputs_config.len());
    for (key, expr) in outputs_config {
        let value = template.parse_any(expr, &variables).map_err(|err| {
            CompozyError::OutputTransform { field: key.clone(), message: err.to_string() }
        })?;
        transformed.insert(key.clone(), value);
    }
    Ok(Value::Object(transformed))
}

fn output_with_empty_outputs_submap(output: &Value) -> Value {
    match output {
        Value::Object(map) if !map.contains_key("outputs") => {
            let mut with_empty = map.clone();
            with_empty.insert("outputs".to_string(), Value::Object(serde_json::Map::new()));
            Value::Object(with_empty)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::config::{TaskConfig, WorkflowConfig};
    use crate::compozy::context_builder::ContextBuilder;
    use crate::compozy::ids::OrgID;
    use crate::compozy::state::WorkflowState;
    use serde_json::json;

    fn ctx() -> NormalizationContext {
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let task = TaskConfig::new("t");
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![task.clone()], env: None, schedule: None, opts: None };
        builder.build(&wf_state, &wf_config, &task, None)
    }

    #[test]
    fn nil_outputs_config_returns_output_unchanged() {
        let template = TemplateEngine::new();
        let output = json!({"a": 1});
        let result = transform_output(&template, output.clone(), None, &ctx()).unwrap();
        assert_eq!(result, output);
    }

    #[test]
    fn nil_output_returns_nil_regardless_of_outputs_config() {
        let template = TemplateEngine::new();
        let mut outputs_config = InputMap::new();
        outputs_config.insert("a".to_string(), json!("{{output.a}}"));
        let result = transform_output(&template, Value::Null, Some(&outputs_config), &ctx()).unwrap();
        assert!(result.is_null());
    }

    #[test]
    fn missing_outputs_submap_counts_as_empty() {
        let template = TemplateEngine::new();
        let mut outputs_config = InputMap::new();
        outputs_config.insert("child_count".to_string(), json!("{{len output.outputs}}"));
        let result = transform_output(&template, json!({}), Some(&outputs_config), &ctx()).unwrap();
        assert_eq!(result["child_count"], json!("0"));
    }

    #[test]
    fn field_error_is_wrapped_with_offending_key() {
        let template = TemplateEngine::new();
        let mut outputs_config = InputMap::new();
        outputs_config.insert("bad".to_string(), json!("{{missing_field}}"));
        let err = transform_output(&template, json!({"a": 1}), Some(&outputs_config), &ctx()).unwrap_err();
        match err {
            CompozyError::OutputTransform { field, .. } => assert_eq!(field, "bad"),
            other => panic!("expected OutputTransform, got {other:?}"),
        }
    }
}
