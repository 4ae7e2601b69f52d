//! Factory for per-task-type components (§4.6).
//!
//! Mirrors the teacher's type-tag-to-handler dispatch pattern (its
//! `workflow::builder`/`workflows::executor` modules mapped a `TypeId` to a
//! node handler); here the tag is a declarative [`TaskType`] string instead.

use super::config::TaskType;
use super::context::NormalizationContext;
use super::context_builder::ContextBuilder;
use super::error::{CompozyError, Result};
use super::normalizers::{self, NormalizedTask};
use super::template::TemplateEngine;
use std::sync::Arc;

/// Which response-handling path a task type needs at completion (§4.6): every
/// type gets the shared base contract (`ResponseHandler::handle`); `Wait`
/// additionally needs its signal-payload logging and timeout-vs-failure
/// disambiguation run first. The concrete handler types live in the API
/// crate (they need the task-state repository); this is the task-type →
/// handler-kind half of the dispatch, mirroring `normalize`'s task-type →
/// normalizer dispatch above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHandlerKind {
    Standard,
    Wait,
}

/// Shared singleton components every normalizer/handler call needs. Built
/// once per process (or per test) and handed to the orchestrator.
pub struct Factory {
    pub template_engine: Arc<TemplateEngine>,
    pub context_builder: Arc<ContextBuilder>,
}

impl Factory {
    pub fn new() -> Self {
        Self { template_engine: Arc::new(TemplateEngine::new()), context_builder: Arc::new(ContextBuilder::new()) }
    }

    /// `CreateNormalizer(taskType)`: dispatches to the matching normalizer
    /// function. Empty type already resolves to basic in
    /// `TaskConfig::resolved_type`; an unresolved type here is always
    /// `UnsupportedTypeError`.
    pub fn normalize(&self, ctx: &NormalizationContext) -> Result<NormalizedTask> {
        ctx.task_config
            .resolved_type()
            .ok_or_else(|| CompozyError::UnsupportedType {
                task_type: ctx.task_config.task_type.clone().unwrap_or_default(),
            })?;
        normalizers::normalize(ctx, &self.template_engine)
    }

    /// `CreateResponseHandler(taskType)`: which handling path `task_type`
    /// needs at completion.
    pub fn create_response_handler(&self, task_type: TaskType) -> ResponseHandlerKind {
        match task_type {
            TaskType::Wait => ResponseHandlerKind::Wait,
            _ => ResponseHandlerKind::Standard,
        }
    }

    /// Validates that `task_type` names a component this factory knows how to
    /// build, independent of any particular task config.
    pub fn supports(&self, task_type: &str) -> bool {
        TaskType::from_config_str(Some(task_type)).is_some()
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_known_and_rejects_unknown_types() {
        let factory = Factory::new();
        assert!(factory.supports("basic"));
        assert!(factory.supports("parallel"));
        assert!(!factory.supports("bogus"));
    }

    #[test]
    fn only_wait_gets_the_wait_response_handler() {
        let factory = Factory::new();
        assert_eq!(factory.create_response_handler(TaskType::Wait), ResponseHandlerKind::Wait);
        assert_eq!(factory.create_response_handler(TaskType::Basic), ResponseHandlerKind::Standard);
        assert_eq!(factory.create_response_handler(TaskType::Parallel), ResponseHandlerKind::Standard);
    }
}
