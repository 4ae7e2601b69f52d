//! Task & Workflow Execution Engine core: a declarative, YAML-configured task
//! tree, normalized through a template-evaluation layer and driven by a
//! durable workflow host.

pub mod collection_expander;
pub mod config;
pub mod context;
pub mod context_builder;
pub mod dto;
pub mod env_merger;
pub mod error;
pub mod factory;
pub mod ids;
pub mod normalizers;
pub mod orchestrator;
pub mod output_transformer;
pub mod state;
pub mod strategy;
pub mod template;

pub use config::{ActionConfig, EnvMap, InputMap, RouteTable, Strategy, TaskConfig, TaskType, TransitionAction, TransitionConfig, WorkflowConfig};
pub use context::NormalizationContext;
pub use context_builder::ContextBuilder;
pub use dto::{ExecId, ExecutionDto};
pub use error::{CompozyError, ErrorDetail, Result};
pub use factory::{Factory, ResponseHandlerKind};
pub use ids::{CoreID, OrgID, TaskExecID, WorkflowExecID};
pub use orchestrator::Orchestrator;
pub use state::{Component, ExecutionType, Status, TaskState, UsageSummary, WorkflowState};
pub use template::TemplateEngine;
