//! Row ↔ domain conversions (§4.9 ambient note): `Queryable`/`Insertable`
//! structs live here so `diesel::table!` output never leaks into
//! `workflow_engine_core::compozy::state` domain types.

use super::schema::{execution_llm_usage, task_states, workflow_states};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::ids::{OrgID, TaskExecID, WorkflowExecID};
use workflow_engine_core::compozy::state::{Component, ExecutionType, Status, TaskState, UsageSummary, WorkflowState};

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| CompozyError::validation(format!("malformed {field} {raw}: {e}")))
}

fn status_to_db(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::Running => "running",
        Status::Paused => "paused",
        Status::Canceled => "canceled",
        Status::Success => "success",
        Status::Failed => "failed",
    }
}

fn status_from_db(raw: &str) -> Result<Status> {
    Ok(match raw {
        "pending" => Status::Pending,
        "running" => Status::Running,
        "paused" => Status::Paused,
        "canceled" => Status::Canceled,
        "success" => Status::Success,
        "failed" => Status::Failed,
        other => return Err(CompozyError::validation(format!("unknown status {other}"))),
    })
}

fn component_to_db(component: Component) -> &'static str {
    match component {
        Component::Agent => "agent",
        Component::Tool => "tool",
        Component::Basic => "basic",
        Component::Parallel => "parallel",
        Component::Collection => "collection",
        Component::Router => "router",
        Component::Wait => "wait",
        Component::Aggregate => "aggregate",
        Component::Composite => "composite",
        Component::Signal => "signal",
        Component::Memory => "memory",
    }
}

fn component_from_db(raw: &str) -> Result<Component> {
    Ok(match raw {
        "agent" => Component::Agent,
        "tool" => Component::Tool,
        "basic" => Component::Basic,
        "parallel" => Component::Parallel,
        "collection" => Component::Collection,
        "router" => Component::Router,
        "wait" => Component::Wait,
        "aggregate" => Component::Aggregate,
        "composite" => Component::Composite,
        "signal" => Component::Signal,
        "memory" => Component::Memory,
        other => return Err(CompozyError::validation(format!("unknown component {other}"))),
    })
}

fn execution_type_to_db(execution_type: ExecutionType) -> &'static str {
    match execution_type {
        ExecutionType::Basic => "basic",
        ExecutionType::Router => "router",
        ExecutionType::Parallel => "parallel",
        ExecutionType::Collection => "collection",
        ExecutionType::Composite => "composite",
    }
}

fn execution_type_from_db(raw: &str) -> Result<ExecutionType> {
    Ok(match raw {
        "basic" => ExecutionType::Basic,
        "router" => ExecutionType::Router,
        "parallel" => ExecutionType::Parallel,
        "collection" => ExecutionType::Collection,
        "composite" => ExecutionType::Composite,
        other => return Err(CompozyError::validation(format!("unknown execution_type {other}"))),
    })
}

#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = workflow_states)]
#[diesel(primary_key(workflow_exec_id, org_id))]
pub struct WorkflowStateRow {
    pub workflow_exec_id: Uuid,
    pub workflow_id: String,
    pub status: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub usage: Option<serde_json::Value>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = workflow_states, treat_none_as_null = true)]
pub struct NewWorkflowStateRow {
    pub workflow_exec_id: Uuid,
    pub workflow_id: String,
    pub status: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub usage: Option<serde_json::Value>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStateRow {
    /// Converts a domain `WorkflowState` into its insertable row. `tasks` is
    /// dropped: it is a repository-side projection, never stored on the
    /// workflow row itself.
    pub fn from_domain(state: &WorkflowState) -> Result<NewWorkflowStateRow> {
        Ok(NewWorkflowStateRow {
            workflow_exec_id: parse_uuid("workflow_exec_id", state.workflow_exec_id.as_str())?,
            workflow_id: state.workflow_id.clone(),
            status: status_to_db(state.status).to_string(),
            input: state.input.clone(),
            output: state.output.clone(),
            error: state.error.as_ref().map(|e| serde_json::to_value(e)).transpose()?,
            usage: None,
            org_id: parse_uuid("org_id", state.org_id.as_str())?,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    /// Rehydrates the domain type. `tasks` is left empty; callers populate it
    /// from a separate `task_states` query (§4.9 `ListStatesWithTasks`).
    pub fn into_domain(self) -> Result<WorkflowState> {
        Ok(WorkflowState {
            workflow_id: self.workflow_id,
            workflow_exec_id: WorkflowExecID::from(self.workflow_exec_id.to_string()),
            status: status_from_db(&self.status)?,
            input: self.input,
            output: self.output,
            error: self.error.map(serde_json::from_value).transpose()?,
            tasks: Default::default(),
            org_id: OrgID::from(self.org_id.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = task_states)]
#[diesel(primary_key(task_exec_id, org_id))]
pub struct TaskStateRow {
    pub task_exec_id: Uuid,
    pub task_id: String,
    pub workflow_exec_id: Uuid,
    pub parent_state_id: Option<Uuid>,
    pub component: String,
    pub execution_type: String,
    pub status: String,
    pub agent_id: Option<String>,
    pub tool_id: Option<String>,
    pub action_id: Option<String>,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub parallel_state: Option<serde_json::Value>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = task_states, treat_none_as_null = true)]
pub struct NewTaskStateRow {
    pub task_exec_id: Uuid,
    pub task_id: String,
    pub workflow_exec_id: Uuid,
    pub parent_state_id: Option<Uuid>,
    pub component: String,
    pub execution_type: String,
    pub status: String,
    pub agent_id: Option<String>,
    pub tool_id: Option<String>,
    pub action_id: Option<String>,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub parallel_state: Option<serde_json::Value>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskStateRow {
    pub fn from_domain(state: &TaskState) -> Result<NewTaskStateRow> {
        Ok(NewTaskStateRow {
            task_exec_id: parse_uuid("task_exec_id", state.task_exec_id.as_str())?,
            task_id: state.task_id.clone(),
            workflow_exec_id: parse_uuid("workflow_exec_id", state.workflow_exec_id.as_str())?,
            parent_state_id: state.parent_state_id.as_ref().map(|id| parse_uuid("parent_state_id", id.as_str())).transpose()?,
            component: component_to_db(state.component).to_string(),
            execution_type: execution_type_to_db(state.execution_type).to_string(),
            status: status_to_db(state.status).to_string(),
            agent_id: state.agent_id.clone(),
            tool_id: state.tool_id.clone(),
            action_id: state.action_id.clone(),
            input: state.input.clone(),
            output: state.output.clone(),
            error: state.error.as_ref().map(|e| serde_json::to_value(e)).transpose()?,
            parallel_state: state.parallel_state.clone(),
            org_id: parse_uuid("org_id", state.org_id.as_str())?,
            created_at: state.created_at,
            updated_at: state.updated_at,
        })
    }

    pub fn into_domain(self) -> Result<TaskState> {
        Ok(TaskState {
            task_id: self.task_id,
            task_exec_id: TaskExecID::from(self.task_exec_id.to_string()),
            workflow_exec_id: WorkflowExecID::from(self.workflow_exec_id.to_string()),
            parent_state_id: self.parent_state_id.map(|id| TaskExecID::from(id.to_string())),
            component: component_from_db(&self.component)?,
            execution_type: execution_type_from_db(&self.execution_type)?,
            status: status_from_db(&self.status)?,
            agent_id: self.agent_id,
            tool_id: self.tool_id,
            action_id: self.action_id,
            input: self.input,
            output: self.output,
            error: self.error.map(serde_json::from_value).transpose()?,
            parallel_state: self.parallel_state,
            org_id: OrgID::from(self.org_id.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = execution_llm_usage)]
#[diesel(primary_key(task_exec_id, component))]
pub struct UsageSummaryRow {
    pub task_exec_id: Uuid,
    pub component: String,
    pub workflow_exec_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = execution_llm_usage, treat_none_as_null = true)]
pub struct NewUsageSummaryRow {
    pub task_exec_id: Uuid,
    pub component: String,
    pub workflow_exec_id: Option<Uuid>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub reasoning_tokens: Option<i64>,
    pub cached_prompt_tokens: Option<i64>,
    pub org_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UsageSummaryRow {
    pub fn from_domain(usage: &UsageSummary) -> Result<NewUsageSummaryRow> {
        Ok(NewUsageSummaryRow {
            task_exec_id: parse_uuid("task_exec_id", usage.task_exec_id.as_str())?,
            component: component_to_db(usage.component).to_string(),
            workflow_exec_id: usage.workflow_exec_id.as_ref().map(|id| parse_uuid("workflow_exec_id", id.as_str())).transpose()?,
            provider: usage.provider.clone(),
            model: usage.model.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            reasoning_tokens: usage.reasoning_tokens,
            cached_prompt_tokens: usage.cached_prompt_tokens,
            org_id: parse_uuid("org_id", usage.org_id.as_str())?,
            created_at: usage.created_at,
            updated_at: usage.updated_at,
        })
    }

    pub fn into_domain(self) -> Result<UsageSummary> {
        Ok(UsageSummary {
            task_exec_id: TaskExecID::from(self.task_exec_id.to_string()),
            component: component_from_db(&self.component)?,
            workflow_exec_id: self.workflow_exec_id.map(|id| WorkflowExecID::from(id.to_string())),
            provider: self.provider,
            model: self.model,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            reasoning_tokens: self.reasoning_tokens,
            cached_prompt_tokens: self.cached_prompt_tokens,
            org_id: OrgID::from(self.org_id.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_engine_core::compozy::ids::OrgID as DomainOrgID;
    use serde_json::json;

    #[test]
    fn workflow_state_round_trips_through_row() {
        let state = WorkflowState::new("wf", DomainOrgID::new(), json!({"a": 1}));
        let row = WorkflowStateRow::from_domain(&state).unwrap();
        let rehydrated = WorkflowStateRow {
            workflow_exec_id: row.workflow_exec_id,
            workflow_id: row.workflow_id,
            status: row.status,
            input: row.input,
            output: row.output,
            error: row.error,
            usage: row.usage,
            org_id: row.org_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
        .into_domain()
        .unwrap();
        assert_eq!(rehydrated.workflow_id, "wf");
        assert_eq!(rehydrated.status, Status::Pending);
        assert_eq!(rehydrated.input, json!({"a": 1}));
    }

    #[test]
    fn malformed_uuid_is_rejected() {
        assert!(parse_uuid("x", "not-a-uuid").is_err());
    }

    #[test]
    fn status_round_trips_through_db_string() {
        for status in [Status::Pending, Status::Running, Status::Paused, Status::Canceled, Status::Success, Status::Failed] {
            assert_eq!(status_from_db(status_to_db(status)).unwrap(), status);
        }
    }
}
