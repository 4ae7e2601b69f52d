//! # Compozy API
//!
//! Durable persistence and execution host for the compozy task & workflow
//! engine: diesel-backed repositories, the response-handler pipeline, and
//! the durable workflow host that drives a running workflow's task
//! sequence end to end.
//!
//! ## Core Components
//!
//! - **`compozy::config`**: environment-loaded runtime configuration.
//! - **`compozy::repositories`**: `diesel`+`r2d2`-backed persistence for
//!   `WorkflowState`/`TaskState`/`UsageSummary`.
//! - **`compozy::response_handlers`**: validate → transform → persist →
//!   recompute parent status → resolve next action.
//! - **`compozy::host`**: the durable workflow host, its bounded concurrent
//!   fan-out executor, and the signal gate.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod compozy;

/// Current version of the API crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::compozy::config::CompozyConfig;
    pub use crate::compozy::host::{DurableWorkflowHost, InProcessDurableHost};
    pub use crate::compozy::repositories::{ConnectionPool, LlmUsageRepository, TaskStateRepository, WorkflowStateRepository};
    pub use workflow_engine_core::prelude::*;
}
