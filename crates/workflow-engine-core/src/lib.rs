//! # Compozy Core
//!
//! Core primitives for the task & workflow execution engine: a declarative,
//! YAML-configured task tree normalized through a template-evaluation layer
//! and driven by a durable workflow host (the host itself, and all
//! persistence, live in `workflow-engine-api`).
//!
//! ## Core Concepts
//!
//! - **`TaskConfig`/`WorkflowConfig`**: the read-only, `serde`-deserializable
//!   declaration of a task tree.
//! - **`Orchestrator`**: sequences context-build → normalize → transform for
//!   one task.
//! - **`WorkflowState`/`TaskState`**: the durable row shapes callers persist.
//! - **`ExecutionDto`**: the API-facing view of an execution, with ETag/
//!   If-Match semantics.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod compozy;

/// Current version of the workflow engine core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::compozy::{
        CompozyError, Component, ContextBuilder, ExecutionDto, ExecutionType, Factory, NormalizationContext, Orchestrator, Result, Status,
        TaskConfig, TaskState, WorkflowConfig, WorkflowState,
    };
    pub use serde_json::{json, Value};
    pub use uuid::Uuid;
}
