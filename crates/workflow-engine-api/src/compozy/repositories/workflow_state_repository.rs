//! Workflow-state repository (§4.9): `Upsert`/`Get`/`List`/`UpdateStatus`,
//! `CompleteWorkflow`, and the batched `ListStatesWithTasks` path.

use super::llm_usage_repository::LlmUsageRepository;
use super::models::{TaskStateRow, WorkflowStateRow};
use super::schema::{task_states, workflow_states};
use super::pool::{ConnectionPool, PgPooledConnection};
use diesel::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;
use workflow_engine_core::compozy::dto::ExecutionDto;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::ids::{OrgID, WorkflowExecID};
use workflow_engine_core::compozy::state::{Status, TaskState, WorkflowState};

const IN_FLIGHT_STATUSES: [&str; 2] = ["pending", "running"];

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

/// Deterministic child-aggregate output used when the output transformer
/// itself errors out (§9): never leave `output` empty after a failed
/// transform. Keys are sorted (`BTreeMap`); each child is rendered as
/// `{output, parent_state_id?, execution_type?}`.
fn fallback_aggregate_output(state: &WorkflowState) -> serde_json::Value {
    let mut by_task_id: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    for task in state.tasks.values() {
        let mut entry = serde_json::Map::new();
        entry.insert("output".to_string(), task.output.clone().unwrap_or(serde_json::Value::Null));
        if let Some(parent_state_id) = &task.parent_state_id {
            entry.insert("parent_state_id".to_string(), serde_json::Value::String(parent_state_id.to_string()));
        }
        entry.insert("execution_type".to_string(), serde_json::to_value(task.execution_type).unwrap_or(serde_json::Value::Null));
        by_task_id.insert(task.task_id.as_str(), serde_json::Value::Object(entry));
    }
    serde_json::json!({ "outputs": by_task_id })
}

pub struct WorkflowStateRepository {
    pool: Arc<ConnectionPool>,
}

impl WorkflowStateRepository {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Obtains a pooled connection up front (the only `.await` point), then
    /// runs `f` on the blocking pool so the connection never crosses an
    /// `.await` once the diesel call starts (§4.9 ambient note).
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

    /// Inserts a new row or updates an existing one, keyed by
    /// `(workflow_exec_id, org_id)`. `ON CONFLICT` targets the composite key.
    pub async fn upsert(&self, state: &WorkflowState) -> Result<()> {
        let row = WorkflowStateRow::from_domain(state)?;
        self.with_conn(move |conn| {
            diesel::insert_into(workflow_states::table)
                .values(&row)
                .on_conflict((workflow_states::workflow_exec_id, workflow_states::org_id))
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID) -> Result<WorkflowState> {
        let exec_id = parse_uuid("workflow_exec_id", workflow_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let mut state = self
            .with_conn(move |conn| {
                let row = workflow_states::table.find((exec_id, org)).first::<WorkflowStateRow>(conn)?;
                row.into_domain()
            })
            .await?;
        state.tasks = self.fetch_task_hierarchy(workflow_exec_id, org_id).await?;
        Ok(state)
    }

    /// §6.4: the API-facing view of one workflow execution, with its rolled-up
    /// LLM usage and a deterministic ETag for conditional reads/writes.
    pub async fn get_dto(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID, usage_repo: &LlmUsageRepository) -> Result<ExecutionDto> {
        let state = self.get(workflow_exec_id, org_id).await?;
        let usage = usage_repo.list_for_workflow(workflow_exec_id, org_id).await?;
        Ok(ExecutionDto::from_workflow_state(&state, usage))
    }

    /// `List`: filters by status and/or workflow id within a tenant.
    pub async fn list(&self, org_id: &OrgID, status: Option<Status>, workflow_id: Option<String>) -> Result<Vec<WorkflowState>> {
        let org = parse_uuid("org_id", org_id.as_str())?;
        let status_str = status.map(status_to_db);
        let rows = self
            .with_conn(move |conn| {
                let mut query = workflow_states::table.filter(workflow_states::org_id.eq(org)).into_boxed();
                if let Some(s) = status_str {
                    query = query.filter(workflow_states::status.eq(s));
                }
                if let Some(wid) = workflow_id {
                    query = query.filter(workflow_states::workflow_id.eq(wid));
                }
                Ok(query.load::<WorkflowStateRow>(conn)?)
            })
            .await?;
        rows.into_iter().map(WorkflowStateRow::into_domain).collect()
    }

    pub async fn update_status(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID, status: Status) -> Result<()> {
        let exec_id = parse_uuid("workflow_exec_id", workflow_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let status_str = status_to_db(status);
        self.with_conn(move |conn| {
            diesel::update(workflow_states::table.find((exec_id, org)))
                .set((workflow_states::status.eq(status_str), workflow_states::updated_at.eq(chrono::Utc::now())))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    /// Recursive hierarchy query (§4.9): every task row for this execution,
    /// including descendants reachable through `parent_state_id`, fetched in
    /// one round-trip off the flat `workflow_exec_id` index — every descendant
    /// still carries the top-level `workflow_exec_id`, so no recursive CTE or
    /// self-join is needed to reach them.
    async fn fetch_task_hierarchy(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID) -> Result<HashMap<String, TaskState>> {
        let exec_id = parse_uuid("workflow_exec_id", workflow_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let rows = self
            .with_conn(move |conn| {
                Ok(task_states::table
                    .filter(task_states::workflow_exec_id.eq(exec_id))
                    .filter(task_states::org_id.eq(org))
                    .load::<TaskStateRow>(conn)?)
            })
            .await?;

        let mut by_task_id = HashMap::new();
        for row in rows {
            let task = row.into_domain()?;
            by_task_id.insert(task.task_id.clone(), task);
        }
        Ok(by_task_id)
    }

    /// `ListStatesWithTasks`: batches child-task fetches for N workflows via
    /// `WHERE workflow_exec_id = ANY($1)`, avoiding one query per workflow.
    pub async fn list_states_with_tasks(&self, workflow_exec_ids: &[WorkflowExecID], org_id: &OrgID) -> Result<Vec<WorkflowState>> {
        let exec_ids: Vec<Uuid> =
            workflow_exec_ids.iter().map(|id| parse_uuid("workflow_exec_id", id.as_str())).collect::<Result<_>>()?;
        let org = parse_uuid("org_id", org_id.as_str())?;

        let exec_ids_for_tasks = exec_ids.clone();
        let wf_rows = self
            .with_conn(move |conn| {
                Ok(workflow_states::table
                    .filter(workflow_states::workflow_exec_id.eq_any(exec_ids))
                    .filter(workflow_states::org_id.eq(org))
                    .load::<WorkflowStateRow>(conn)?)
            })
            .await?;

        let task_rows = self
            .with_conn(move |conn| {
                Ok(task_states::table
                    .filter(task_states::workflow_exec_id.eq_any(exec_ids_for_tasks))
                    .filter(task_states::org_id.eq(org))
                    .load::<TaskStateRow>(conn)?)
            })
            .await?;

        let mut tasks_by_workflow: HashMap<Uuid, Vec<TaskStateRow>> = HashMap::new();
        for row in task_rows {
            tasks_by_workflow.entry(row.workflow_exec_id).or_default().push(row);
        }

        wf_rows
            .into_iter()
            .map(|wf_row| {
                let wf_exec_id = wf_row.workflow_exec_id;
                let mut state = wf_row.into_domain()?;
                if let Some(rows) = tasks_by_workflow.remove(&wf_exec_id) {
                    for row in rows {
                        let task = row.into_domain()?;
                        state.tasks.insert(task.task_id.clone(), task);
                    }
                }
                Ok(state)
            })
            .collect()
    }

    /// `CompleteWorkflow(workflowExecID, outputTransformer)` (§4.9): locks the
    /// row with `SELECT … FOR UPDATE`, aggregates top-level child statuses,
    /// applies the output transformer with a forced-failure fallback on
    /// transformer error, and persists — all inside one transaction, so the
    /// row lock is held from the initial read through the final `UPDATE` and
    /// no second `complete_workflow` call can interleave between them.
    pub async fn complete_workflow<F>(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID, output_transformer: F) -> Result<WorkflowState>
    where
        F: FnOnce(&WorkflowState) -> Result<serde_json::Value> + Send + 'static,
    {
        let exec_id = parse_uuid("workflow_exec_id", workflow_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;

        self.with_conn(move |conn| {
            conn.transaction(|conn| -> Result<WorkflowState> {
                let row = workflow_states::table.find((exec_id, org)).for_update().first::<WorkflowStateRow>(conn)?;
                let mut state = row.into_domain()?;
                if state.status.is_terminal() {
                    return Err(CompozyError::conflict(format!("workflow {exec_id} already terminal")));
                }

                let top_level_rows = task_states::table
                    .filter(task_states::workflow_exec_id.eq(exec_id))
                    .filter(task_states::org_id.eq(org))
                    .filter(task_states::parent_state_id.is_null())
                    .for_update()
                    .load::<TaskStateRow>(conn)?;

                if top_level_rows.iter().any(|r| IN_FLIGHT_STATUSES.contains(&r.status.as_str())) {
                    return Err(CompozyError::WorkflowNotReady { message: format!("workflow {exec_id} still has running children") });
                }
                let aggregated_status = if top_level_rows.iter().any(|r| r.status == "failed") { Status::Failed } else { Status::Success };

                for row in top_level_rows {
                    let task = row.into_domain()?;
                    state.tasks.insert(task.task_id.clone(), task);
                }

                let (final_status, output, error) = match output_transformer(&state) {
                    Ok(output) => (aggregated_status, Some(output), None),
                    Err(err) if aggregated_status == Status::Success => {
                        (Status::Failed, Some(fallback_aggregate_output(&state)), Some(err.to_detail(None)))
                    }
                    Err(_) => (Status::Failed, Some(fallback_aggregate_output(&state)), state.error.clone()),
                };
                state.status = final_status;
                state.output = output;
                state.error = error;
                state.updated_at = chrono::Utc::now();

                let final_row = WorkflowStateRow::from_domain(&state)?;
                diesel::update(workflow_states::table.find((exec_id, org)))
                    .set((
                        workflow_states::status.eq(final_row.status),
                        workflow_states::output.eq(final_row.output),
                        workflow_states::error.eq(final_row.error),
                        workflow_states::updated_at.eq(final_row.updated_at),
                    ))
                    .execute(conn)?;

                Ok(state)
            })
        })
        .await
    }
}
