//! Durable workflow & task state (§3).

use super::ids::{OrgID, TaskExecID, WorkflowExecID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Shared by workflows and tasks. Terminal statuses are monotonic: once a row
/// reaches `Success`, `Failed` or `Canceled` it may never move to a
/// non-terminal status again (§8.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Running,
    Paused,
    Canceled,
    Success,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Failed | Status::Canceled)
    }
}

/// What a task row represents at the leaf level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Agent,
    Tool,
    Basic,
    Parallel,
    Collection,
    Router,
    Wait,
    Aggregate,
    Composite,
    Signal,
    Memory,
}

/// Structural role of a task row, independent of its `Component`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Basic,
    Router,
    Parallel,
    Collection,
    Composite,
}

/// `{ code, message, details? }` persisted alongside a failed state.
pub use super::error::ErrorDetail as StateError;

/// Durable workflow-level row (§3 WorkflowState, §6.2 `workflow_states`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub workflow_exec_id: WorkflowExecID,
    pub status: Status,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<StateError>,
    /// Authoritative projection of all task rows for this execution, joined
    /// via `workflow_exec_id`. Populated by the repository, never written to
    /// directly by normalization/response-handler code.
    #[serde(default)]
    pub tasks: HashMap<String, TaskState>,
    pub org_id: OrgID,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>, org_id: OrgID, input: Value) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: workflow_id.into(),
            workflow_exec_id: WorkflowExecID::new(),
            status: Status::Pending,
            input,
            output: None,
            error: None,
            tasks: HashMap::new(),
            org_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attempts to move to `next`. No-op (returns `false`) once terminal.
    pub fn transition_to(&mut self, next: Status) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Top-level children only: rows whose `parent_state_id` is `None`.
    pub fn top_level_tasks(&self) -> impl Iterator<Item = &TaskState> {
        self.tasks.values().filter(|t| t.parent_state_id.is_none())
    }
}

/// Durable task-level row (§3 TaskState, §6.2 `task_states`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub task_exec_id: TaskExecID,
    pub workflow_exec_id: WorkflowExecID,
    pub parent_state_id: Option<TaskExecID>,
    pub component: Component,
    pub execution_type: ExecutionType,
    pub status: Status,
    pub agent_id: Option<String>,
    pub tool_id: Option<String>,
    pub action_id: Option<String>,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<StateError>,
    /// Opaque JSON describing the child set for parallel/collection tasks.
    pub parallel_state: Option<Value>,
    pub org_id: OrgID,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    pub fn new(
        task_id: impl Into<String>,
        workflow_exec_id: WorkflowExecID,
        org_id: OrgID,
        component: Component,
        execution_type: ExecutionType,
        input: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            task_exec_id: TaskExecID::new(),
            workflow_exec_id,
            parent_state_id: None,
            component,
            execution_type,
            status: Status::Pending,
            agent_id: None,
            tool_id: None,
            action_id: None,
            input,
            output: None,
            error: None,
            parallel_state: None,
            org_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, next: Status) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }

    /// Validates the `Component` + `ExecutionType` consistency invariant from §3:
    /// basic rows carry exactly one of (agent+action)/(tool)/(none); router
    /// rows carry none of those and no parallel state; parallel/collection
    /// rows carry parallel state and no agent/tool/action ids.
    pub fn validate_consistency(&self) -> super::error::Result<()> {
        use super::error::CompozyError;
        let has_agent = self.agent_id.is_some() && self.action_id.is_some();
        let has_tool = self.tool_id.is_some();
        let has_none = self.agent_id.is_none() && self.tool_id.is_none() && self.action_id.is_none();

        match self.execution_type {
            ExecutionType::Basic => {
                let exclusive_count = [has_agent, has_tool, has_none].iter().filter(|b| **b).count();
                if exclusive_count != 1 {
                    return Err(CompozyError::validation(format!(
                        "basic task {} must have exactly one of agent+action / tool / none, got agent_id={:?} tool_id={:?} action_id={:?}",
                        self.task_id, self.agent_id, self.tool_id, self.action_id
                    )));
                }
            }
            ExecutionType::Router => {
                if !has_none || self.parallel_state.is_some() {
                    return Err(CompozyError::validation(format!(
                        "router task {} must have no agent/tool/action id and no parallel state",
                        self.task_id
                    )));
                }
            }
            ExecutionType::Parallel | ExecutionType::Collection => {
                if self.parallel_state.is_none() {
                    return Err(CompozyError::validation(format!(
                        "{:?} task {} must carry parallel_state",
                        self.execution_type, self.task_id
                    )));
                }
                if !has_none {
                    return Err(CompozyError::validation(format!(
                        "{:?} task {} must not carry agent/tool/action ids",
                        self.execution_type, self.task_id
                    )));
                }
            }
            ExecutionType::Composite => {}
        }
        Ok(())
    }
}

/// Optional per-task-component LLM usage summary (§3 UsageSummary, §6.2 `execution_llm_usage`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub task_exec_id: TaskExecID,
    pub component: Component,
    pub workflow_exec_id: Option<WorkflowExecID>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub org_id: OrgID,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
