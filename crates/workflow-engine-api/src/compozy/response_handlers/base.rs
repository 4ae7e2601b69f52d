//! Shared base response handler (§4.10): persists a finished task's state,
//! recomputes its parent's status, transforms output unless deferred, and
//! resolves the transition into a `NextAction` for the durable host.

use crate::compozy::repositories::TaskStateRepository;
use serde_json::Value;
use std::sync::Arc;
use workflow_engine_core::compozy::config::{TaskConfig, TaskType, TransitionAction};
use workflow_engine_core::compozy::context::NormalizationContext;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::factory::ResponseHandlerKind;
use workflow_engine_core::compozy::orchestrator::Orchestrator;
use workflow_engine_core::compozy::state::{Status, TaskState, WorkflowState};

use super::parent_status;
use super::wait;

/// How the durable host should proceed after this response is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Continue,
    Goto(String),
    Stop,
    Fail,
}

#[derive(Debug, Clone)]
pub struct ResponseOutput {
    pub state: TaskState,
    pub next_action: NextAction,
}

pub struct ResponseHandler {
    task_repo: Arc<TaskStateRepository>,
    orchestrator: Arc<Orchestrator>,
}

impl ResponseHandler {
    pub fn new(task_repo: Arc<TaskStateRepository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { task_repo, orchestrator }
    }

    /// Runs the shared base contract (§4.10 steps 1-5). `ctx` is the
    /// normalization context built for `task_config`/`task_state` by the
    /// caller before invoking the activity.
    pub async fn handle(
        &self,
        task_config: &TaskConfig,
        workflow_state: &WorkflowState,
        mut task_state: TaskState,
        ctx: &NormalizationContext,
    ) -> Result<ResponseOutput> {
        self.validate(task_config, &task_state, workflow_state)?;

        let resolved_type = task_config.resolved_type().unwrap_or(TaskType::Basic);

        if self.orchestrator.factory().create_response_handler(resolved_type) == ResponseHandlerKind::Wait {
            let signal = task_state.output.as_ref().and_then(|o| o.get("signal"));
            wait::log_signal_payload(&task_state, signal);
            wait::check_timeout(&task_state)?;
        }

        if !resolved_type.defers_output_transform() {
            let raw_output = task_state.output.clone().unwrap_or(Value::Null);
            task_state.output = Some(self.orchestrator.normalize_task_output(ctx, raw_output)?);
        }

        self.task_repo.upsert(&task_state).await?;

        if let Some(parent_exec_id) = &task_state.parent_state_id {
            let parent_strategy = ctx.parent_config.as_ref().map(|p| p.resolved_strategy()).unwrap_or_default();
            if let Some((outcome, siblings)) = parent_status::recompute(&self.task_repo, parent_exec_id, &task_state.org_id, parent_strategy).await? {
                self.task_repo.update_status(parent_exec_id, &task_state.org_id, outcome.parent_status).await?;

                // `fail_fast`/`race` (§4.8): cancel siblings still in flight when the
                // rollup fires early, so they never linger as running/failed.
                for sibling in siblings.iter().filter(|s| outcome.cancel_task_ids.contains(&s.task_id)) {
                    self.task_repo.update_status(&sibling.task_exec_id, &sibling.org_id, Status::Canceled).await?;
                }
            }
        }

        let next_action = self.resolve_next_action(task_config, &task_state);
        Ok(ResponseOutput { state: task_state, next_action })
    }

    fn validate(&self, task_config: &TaskConfig, task_state: &TaskState, workflow_state: &WorkflowState) -> Result<()> {
        if task_config.id != task_state.task_id {
            return Err(CompozyError::validation(format!(
                "task config id `{}` does not match task state id `{}`",
                task_config.id, task_state.task_id
            )));
        }
        if task_state.workflow_exec_id != workflow_state.workflow_exec_id {
            return Err(CompozyError::validation("task state does not belong to the given workflow state"));
        }
        Ok(())
    }

    fn resolve_next_action(&self, task_config: &TaskConfig, task_state: &TaskState) -> NextAction {
        let transition = match task_state.status {
            Status::Success => task_config.on_success.as_ref(),
            Status::Failed => task_config.on_error.as_ref(),
            _ => None,
        };
        let Some(transition) = transition else {
            return if task_state.status == Status::Failed { NextAction::Fail } else { NextAction::Continue };
        };
        match transition.action() {
            TransitionAction::Next(task_id) => NextAction::Goto(task_id.to_string()),
            TransitionAction::Stop => NextAction::Stop,
            TransitionAction::Fail => NextAction::Fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_engine_core::compozy::ids::OrgID;
    use workflow_engine_core::compozy::state::{Component, ExecutionType};

    #[test]
    fn no_transition_on_failure_defaults_to_fail() {
        let task_config = TaskConfig::new("t1");
        let wf_id = workflow_engine_core::compozy::ids::WorkflowExecID::new();
        let mut task_state = TaskState::new("t1", wf_id, OrgID::new(), Component::Basic, ExecutionType::Basic, Value::Null);
        task_state.status = Status::Failed;

        let next = match task_state.status {
            Status::Failed if task_config.on_error.is_none() => NextAction::Fail,
            _ => NextAction::Continue,
        };
        assert_eq!(next, NextAction::Fail);
    }
}
