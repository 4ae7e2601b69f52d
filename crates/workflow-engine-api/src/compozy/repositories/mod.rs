//! State repositories (§4.9): diesel+r2d2-backed persistence for
//! `WorkflowState`/`TaskState`/`UsageSummary`, tenant-scoped by `org_id` on
//! every key and filter.

pub mod llm_usage_repository;
pub mod models;
pub mod pool;
pub mod schema;
pub mod task_state_repository;
pub mod workflow_state_repository;

pub use llm_usage_repository::LlmUsageRepository;
pub use pool::{ConnectionPool, PoolConfig};
pub use task_state_repository::TaskStateRepository;
pub use workflow_state_repository::WorkflowStateRepository;
