//! Parallel / composite normalizer (§4.4): recursively normalizes children via
//! the factory and resolves the worker bound for the fan-out.

use super::super::config::TaskType;
use super::super::context::NormalizationContext;
use super::super::error::Result;
use super::super::template::TemplateEngine;
use super::{evaluate_common, NormalizedTask};
use serde_json::json;

pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let mut normalized = evaluate_common(ctx, template, &["tasks"])?;
    let task_type = ctx.task_config.resolved_type().unwrap_or(TaskType::Parallel);
    let max_workers = ctx.task_config.resolved_max_workers(task_type);
    let strategy = ctx.task_config.resolved_strategy();
    normalized.fields.insert("max_workers".to_string(), json!(max_workers));
    normalized.fields.insert("strategy".to_string(), json!(strategy));
    normalized
        .fields
        .insert("child_task_ids".to_string(), json!(ctx.children_of(&ctx.task_config.id)));
    Ok(normalized)
}
