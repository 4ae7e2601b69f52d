//! Collection task expansion (§4.8): materializes one child `TaskConfig` per
//! item in a collection task's normalized `items` iterable.

use super::config::{TaskConfig, TaskType};
use super::context::NormalizationContext;
use super::error::{CompozyError, Result};
use super::template::TemplateEngine;
use serde_json::Value;

/// Evaluates `items` and clones `task` once per element, substituting
/// `.item`/`.index` into the child's `with` block. Children inherit `cwd`
/// from the parent when they don't set their own. Returns the expanded
/// children in item order; the caller records `ChildrenIndex[parent] = ids`.
pub fn expand(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<Vec<TaskConfig>> {
    let parent = &ctx.task_config;
    let Some(items_expr) = &parent.items else {
        return Ok(Vec::new());
    };
    let Some(item_template) = &parent.task else {
        return Ok(Vec::new());
    };

    let items_value = template.parse_any(items_expr, &ctx.variables)?;
    let items = items_value.as_array().cloned().ok_or_else(|| {
        CompozyError::validation(format!("collection task {} items must evaluate to an array", parent.id))
    })?;

    let mut children = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        children.push(expand_one(parent, item_template, item, index)?);
    }
    Ok(children)
}

fn expand_one(parent: &TaskConfig, item_template: &TaskConfig, item: &Value, index: usize) -> Result<TaskConfig> {
    let mut child = item_template.as_ref().clone();
    child.id = format!("{}[{}]", parent.id, index);
    child.with.insert("item".to_string(), item.clone());
    child.with.insert("index".to_string(), Value::from(index));
    if child.cwd.is_none() {
        child.cwd = parent.cwd.clone();
    }
    Ok(child)
}

/// Default worker bound for a collection's expansion, per §4.8.
pub fn default_collection_max_workers() -> usize {
    TaskType::Collection.default_max_workers()
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
    fn expands_one_child_per_item_with_item_and_index() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"names": ["a", "b", "c"]}));
        let mut collection = TaskConfig::new("c");
        collection.task_type = Some("collection".to_string());
        collection.items = Some(json!("{{workflow.input.names}}"));
        collection.cwd = Some("/base".to_string());
        collection.task = Some(Box::new(TaskConfig::new("item_task")));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![collection.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &collection, None);

        let children = expand(&ctx, &template).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].id, "c[0]");
        assert_eq!(children[0].with["item"], json!("a"));
        assert_eq!(children[0].with["index"], json!(0));
        assert_eq!(children[0].cwd.as_deref(), Some("/base"));
    }

    #[test]
    fn non_array_items_is_a_validation_error() {
        let template = TemplateEngine::new();
        let builder = ContextBuilder::new();
        let wf_state = WorkflowState::new("wf", OrgID::new(), json!({"names": "not-an-array"}));
        let mut collection = TaskConfig::new("c");
        collection.task_type = Some("collection".to_string());
        collection.items = Some(json!("{{workflow.input.names}}"));
        collection.task = Some(Box::new(TaskConfig::new("item_task")));
        let wf_config = WorkflowConfig { id: "wf".to_string(), tasks: vec![collection.clone()], env: None, schedule: None, opts: None };
        let ctx = builder.build(&wf_state, &wf_config, &collection, None);

        assert!(expand(&ctx, &template).is_err());
    }
}
