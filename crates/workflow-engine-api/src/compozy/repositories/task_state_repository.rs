//! Task-state repository (§4.9): `Upsert`/`Get`/`List`/`UpdateStatus` plus
//! task-specific queries by `TaskID`, `AgentID`, `ToolID`, `ParentStateID`.

use super::llm_usage_repository::LlmUsageRepository;
use super::models::TaskStateRow;
use super::schema::task_states;
use super::pool::{ConnectionPool, PgPooledConnection};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use workflow_engine_core::compozy::dto::ExecutionDto;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::ids::{OrgID, TaskExecID, WorkflowExecID};
use workflow_engine_core::compozy::state::{Status, TaskState};

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

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| CompozyError::validation(format!("malformed {field} {raw}: {e}")))
}

pub struct TaskStateRepository {
    pool: Arc<ConnectionPool>,
}

impl TaskStateRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgPooledConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.pool.get_connection().await?;
        tokio::task::spawn_blocking(move || f(&mut conn))
            .await
            .map_err(|e| CompozyError::Transient { message: format!("blocking task join error: {e}") })?
    }

    /// `Upsert`: `ON CONFLICT` targets the composite `(task_exec_id, org_id)` key.
    pub async fn upsert(&self, state: &TaskState) -> Result<()> {
        let row = TaskStateRow::from_domain(state)?;
        self.with_conn(move |conn| {
            diesel::insert_into(task_states::table)
                .values(&row)
                .on_conflict((task_states::task_exec_id, task_states::org_id))
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, task_exec_id: &TaskExecID, org_id: &OrgID) -> Result<TaskState> {
        let exec_id = parse_uuid("task_exec_id", task_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        self.with_conn(move |conn| {
            let row = task_states::table.find((exec_id, org)).first::<TaskStateRow>(conn)?;
            row.into_domain()
        })
        .await
    }

    /// §6.4: the API-facing view of one task execution, carrying its LLM
    /// usage rows and a deterministic ETag for conditional reads/writes.
    pub async fn get_dto(&self, task_exec_id: &TaskExecID, org_id: &OrgID, usage_repo: &LlmUsageRepository) -> Result<ExecutionDto> {
        let state = self.get(task_exec_id, org_id).await?;
        let usage = usage_repo.list_for_task(task_exec_id, org_id).await?;
        Ok(ExecutionDto::from_task_state(&state, usage))
    }

    pub async fn update_status(&self, task_exec_id: &TaskExecID, org_id: &OrgID, status: Status) -> Result<()> {
        let exec_id = parse_uuid("task_exec_id", task_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let status_str = status_to_db(status);
        self.with_conn(move |conn| {
            diesel::update(task_states::table.find((exec_id, org)))
                .set((task_states::status.eq(status_str), task_states::updated_at.eq(chrono::Utc::now())))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// `List` filtered by workflow execution, task id, agent id, tool id, or
    /// parent state id — any combination of filters may be supplied.
    pub async fn list(
        &self,
        org_id: &OrgID,
        workflow_exec_id: Option<&WorkflowExecID>,
        task_id: Option<String>,
        agent_id: Option<String>,
        tool_id: Option<String>,
        parent_state_id: Option<&TaskExecID>,
    ) -> Result<Vec<TaskState>> {
        let org = parse_uuid("org_id", org_id.as_str())?;
        let workflow_exec_uuid = workflow_exec_id.map(|id| parse_uuid("workflow_exec_id", id.as_str())).transpose()?;
        let parent_uuid = parent_state_id.map(|id| parse_uuid("parent_state_id", id.as_str())).transpose()?;

        let rows = self
            .with_conn(move |conn| {
                let mut query = task_states::table.filter(task_states::org_id.eq(org)).into_boxed();
                if let Some(wf) = workflow_exec_uuid {
                    query = query.filter(task_states::workflow_exec_id.eq(wf));
                }
                if let Some(tid) = task_id {
                    query = query.filter(task_states::task_id.eq(tid));
                }
                if let Some(aid) = agent_id {
                    query = query.filter(task_states::agent_id.eq(aid));
                }
                if let Some(toid) = tool_id {
                    query = query.filter(task_states::tool_id.eq(toid));
                }
                match parent_uuid {
                    Some(parent) => query = query.filter(task_states::parent_state_id.eq(parent)),
                    None => {}
                }
                Ok(query.load::<TaskStateRow>(conn)?)
            })
            .await?;

        rows.into_iter().map(TaskStateRow::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_db_maps_every_variant() {
        for status in [Status::Pending, Status::Running, Status::Paused, Status::Canceled, Status::Success, Status::Failed] {
            assert!(!status_to_db(status).is_empty());
        }
    }

    #[test]
    fn malformed_uuid_is_a_validation_error() {
        assert!(parse_uuid("task_exec_id", "not-a-uuid").is_err());
    }
}
