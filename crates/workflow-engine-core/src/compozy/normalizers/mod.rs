//! Per-component-type template normalization (§4.4).
//!
//! `TaskConfig`/`WorkflowConfig` are read-only: normalizers never mutate them.
//! Each normalizer function evaluates its type's templated fields against a
//! [`NormalizationContext`] and returns a [`NormalizedTask`] — the derived,
//! owned result of that evaluation.

pub mod agent;
pub mod aggregate;
pub mod basic;
pub mod collection;
pub mod parallel;
pub mod router;
pub mod tool;
pub mod transition;
pub mod wait;

use super::config::{TaskType, TransitionConfig};
use super::context::NormalizationContext;
use super::error::Result;
use super::template::TemplateEngine;
use serde_json::{Map, Value};

/// Field names that are never evaluated at normalization time — they are
/// runtime-sensitive and re-parsed later, once a task's full output context
/// (including sibling outputs under `.tasks.*`) exists (§4.4).
pub const DEFERRED_FIELDS: &[&str] = &["with", "prompt", "input", "output", "actions", "tools"];

pub fn is_deferred_field(key: &str) -> bool {
    DEFERRED_FIELDS.contains(&key)
}

/// Derived, owned evaluation result for one task (never persisted as-is;
/// consumed by the factory/response-handler layer).
#[derive(Debug, Clone, Default)]
pub struct NormalizedTask {
    pub with: Value,
    pub outputs: Value,
    /// Every other evaluated top-level field, keyed by name (`condition`,
    /// `wait_for`, `routes`, ...), deferred fields excluded.
    pub fields: Map<String, Value>,
}

impl NormalizedTask {
    fn new() -> Self {
        Self { with: Value::Null, outputs: Value::Null, fields: Map::new() }
    }
}

/// Dispatches to the normalizer matching `ctx.task_config`'s resolved type.
pub fn normalize(ctx: &NormalizationContext, template: &TemplateEngine) -> Result<NormalizedTask> {
    let task_type = ctx.task_config.resolved_type().ok_or_else(|| {
        super::error::CompozyError::UnsupportedType {
            task_type: ctx.task_config.task_type.clone().unwrap_or_default(),
        }
    })?;
    match task_type {
        TaskType::Basic => {
            if ctx.task_config.agent.is_some() {
                agent::normalize(ctx, template)
            } else if ctx.task_config.tool.is_some() {
                tool::normalize(ctx, template)
            } else {
                basic::normalize(ctx, template)
            }
        }
        TaskType::Parallel | TaskType::Composite => parallel::normalize(ctx, template),
        TaskType::Collection => collection::normalize(ctx, template),
        TaskType::Router => router::normalize(ctx, template),
        TaskType::Wait => wait::normalize(ctx, template),
        TaskType::Aggregate | TaskType::Signal | TaskType::Memory => aggregate::normalize(ctx, template),
    }
}

/// Evaluates `on_success`/`on_error` for any task type (§4.4 transition normalizers).
pub fn normalize_transitions(
    ctx: &NormalizationContext,
    template: &TemplateEngine,
) -> Result<(Option<TransitionConfig>, Option<TransitionConfig>)> {
    let on_success = ctx
        .task_config
        .on_success
        .as_ref()
        .map(|t| transition::normalize(t, ctx, template))
        .transpose()?;
    let on_error = ctx
        .task_config
        .on_error
        .as_ref()
        .map(|t| transition::normalize(t, ctx, template))
        .transpose()?;
    Ok((on_success, on_error))
}

/// Shared step used by most normalizers: evaluate `with`, then the rest of the
/// config map under the deferred-field filter, skipping `extra_skip` too.
fn evaluate_common(
    ctx: &NormalizationContext,
    template: &TemplateEngine,
    extra_skip: &[&str],
) -> Result<NormalizedTask> {
    let mut out = NormalizedTask::new();
    let with_value = Value::Object(ctx.task_config.with.clone());
    out.with = template.parse_any(&with_value, &ctx.variables)?;

    let as_map = task_config_as_map(&ctx.task_config);
    let filtered = template.parse_map_with_filter(&as_map, &ctx.variables, |key| {
        key == "with" || extra_skip.contains(&key)
    })?;
    out.fields = filtered;
    Ok(out)
}

/// Projects the subset of `TaskConfig` fields that are plausibly templated
/// into a plain JSON map for the filtered evaluator.
fn task_config_as_map(task_config: &super::config::TaskConfig) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("with".to_string(), Value::Object(task_config.with.clone()));
    map.insert("outputs".to_string(), Value::Object(task_config.outputs.clone()));
    if let Some(condition) = &task_config.condition {
        map.insert("condition".to_string(), Value::String(condition.clone()));
    }
    if let Some(wait_for) = &task_config.wait_for {
        map.insert("wait_for".to_string(), Value::String(wait_for.clone()));
    }
    if let Some(on_timeout) = &task_config.on_timeout {
        map.insert("on_timeout".to_string(), Value::String(on_timeout.clone()));
    }
    if let Some(signal) = &task_config.signal {
        map.insert("signal".to_string(), Value::String(signal.clone()));
    }
    map
}
