//! LLM usage repository (§4.9/§6.2): `execution_llm_usage` rows, unique on
//! `(task_exec_id, component)`, tenant-scoped by `org_id`.

use super::models::UsageSummaryRow;
use super::schema::execution_llm_usage;
use super::pool::{ConnectionPool, PgPooledConnection};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::ids::{OrgID, TaskExecID, WorkflowExecID};
use workflow_engine_core::compozy::state::UsageSummary;

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| CompozyError::validation(format!("malformed {field} {raw}: {e}")))
}

pub struct LlmUsageRepository {
    pool: Arc<ConnectionPool>,
}

impl LlmUsageRepository {
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

    /// `Upsert`: `ON CONFLICT (task_exec_id, component)` replaces the summary,
    /// matching the table's unique constraint from §6.2.
    pub async fn upsert(&self, usage: &UsageSummary) -> Result<()> {
        let row = UsageSummaryRow::from_domain(usage)?;
        self.with_conn(move |conn| {
            diesel::insert_into(execution_llm_usage::table)
                .values(&row)
                .on_conflict((execution_llm_usage::task_exec_id, execution_llm_usage::component))
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    pub async fn list_for_task(&self, task_exec_id: &TaskExecID, org_id: &OrgID) -> Result<Vec<UsageSummary>> {
        let exec_id = parse_uuid("task_exec_id", task_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let rows = self
            .with_conn(move |conn| {
                Ok(execution_llm_usage::table
                    .filter(execution_llm_usage::task_exec_id.eq(exec_id))
                    .filter(execution_llm_usage::org_id.eq(org))
                    .load::<UsageSummaryRow>(conn)?)
            })
            .await?;
        rows.into_iter().map(UsageSummaryRow::into_domain).collect()
    }

    /// Every usage row rolled up under one workflow execution (§6.4 exec DTO),
    /// across all descendant task rows rather than a single task.
    pub async fn list_for_workflow(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID) -> Result<Vec<UsageSummary>> {
        let exec_id = parse_uuid("workflow_exec_id", workflow_exec_id.as_str())?;
        let org = parse_uuid("org_id", org_id.as_str())?;
        let rows = self
            .with_conn(move |conn| {
                Ok(execution_llm_usage::table
                    .filter(execution_llm_usage::workflow_exec_id.eq(exec_id))
                    .filter(execution_llm_usage::org_id.eq(org))
                    .load::<UsageSummaryRow>(conn)?)
            })
            .await?;
        rows.into_iter().map(UsageSummaryRow::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_uuid_is_a_validation_error() {
        assert!(parse_uuid("task_exec_id", "not-a-uuid").is_err());
    }
}
