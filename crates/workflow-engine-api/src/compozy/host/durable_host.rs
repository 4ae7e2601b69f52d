//! Durable workflow host adapter (§4.11).
//!
//! Traits (`DurableWorkflowHost`, `Activity`, `SignalChannel`) keep the
//! orchestrator decoupled from the concrete durable-execution substrate; the
//! implementation shipped here drives them with one `tokio` task per running
//! workflow plus the state repositories for durability — the same
//! architectural shape as this codebase's saga orchestrator (a `HashMap`
//! registry of in-flight executions, advanced by an explicit step loop),
//! generalized here from a fixed saga-step list to the compozy task tree.
//!
//! This host walks the workflow's top-level task list sequentially,
//! following `on_success`/`on_error` transitions. A fan-out task (parallel,
//! collection, composite) is driven recursively: its children run through
//! this same host, bounded to `max_workers` concurrency by
//! [`super::parallel_runner::ParallelRunner`], and the result is rolled up
//! through the shared response handler exactly as a leaf task's would be.

use super::parallel_runner::ParallelRunner;
use super::signal_gate::{GateState, SignalGate};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use workflow_engine_core::compozy::config::{TaskConfig, TaskType, WorkflowConfig};
use workflow_engine_core::compozy::context::NormalizationContext;
use workflow_engine_core::compozy::error::{CompozyError, Result};
use workflow_engine_core::compozy::ids::{OrgID, TaskExecID, WorkflowExecID};
use workflow_engine_core::compozy::orchestrator::Orchestrator;
use workflow_engine_core::compozy::state::{Component, ExecutionType, Status, TaskState, WorkflowState};
use workflow_engine_core::compozy::strategy::ChildOutcome;

use crate::compozy::repositories::{TaskStateRepository, WorkflowStateRepository};
use crate::compozy::response_handlers::base::{NextAction, ResponseHandler};

/// Protocol signal names (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowSignal {
    Pause,
    Resume,
    Cancel,
}

/// Activity retry policy (§4.11): exponential backoff, initial 1s,
/// coefficient 2.0, max interval 1 min, max attempts 3.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub coefficient: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { initial_interval: Duration::from_secs(1), coefficient: 2.0, max_interval: Duration::from_secs(60), max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActivityOptions {
    pub start_to_close: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self { start_to_close: Duration::from_secs(30 * 60), retry_policy: RetryPolicy::default() }
    }
}

/// Retries `op` under `policy`, stopping early for non-retriable errors
/// (`Validation`, `UnsupportedType`, `WorkflowNotReady` per
/// [`CompozyError::is_retriable`]).
pub async fn execute_with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_interval;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retriable() || attempt >= policy.max_attempts => return Err(err),
            Err(err) => {
                warn!(attempt, error = %err, "activity failed, retrying");
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(Duration::from_secs_f64(delay.as_secs_f64() * policy.coefficient), policy.max_interval);
            }
        }
    }
}

/// Maps a task's resolved type (plus `agent`/`tool` presence for the basic
/// case) to its persisted `(Component, ExecutionType)` pair (§3).
fn component_and_execution_type(task_config: &TaskConfig) -> Result<(Component, ExecutionType)> {
    let task_type = task_config
        .resolved_type()
        .ok_or_else(|| CompozyError::UnsupportedType { task_type: task_config.task_type.clone().unwrap_or_default() })?;
    Ok(match task_type {
        TaskType::Basic if task_config.agent.is_some() => (Component::Agent, ExecutionType::Basic),
        TaskType::Basic if task_config.tool.is_some() => (Component::Tool, ExecutionType::Basic),
        TaskType::Basic => (Component::Basic, ExecutionType::Basic),
        TaskType::Parallel => (Component::Parallel, ExecutionType::Parallel),
        TaskType::Collection => (Component::Collection, ExecutionType::Collection),
        TaskType::Router => (Component::Router, ExecutionType::Router),
        TaskType::Wait => (Component::Wait, ExecutionType::Basic),
        TaskType::Aggregate => (Component::Aggregate, ExecutionType::Basic),
        TaskType::Composite => (Component::Composite, ExecutionType::Composite),
        TaskType::Signal => (Component::Signal, ExecutionType::Basic),
        TaskType::Memory => (Component::Memory, ExecutionType::Basic),
    })
}

/// Activities the workflow body invokes at its suspension points.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Loads and normalizes the workflow, writes and returns its initial state.
    async fn trigger(&self, workflow_config: &WorkflowConfig, input: Value, org_id: &OrgID) -> Result<WorkflowState>;

    /// Executes one already-normalized task and returns its finished state
    /// (status/output/error populated).
    async fn execute_task(&self, ctx: &NormalizationContext, task_state: TaskState) -> Result<TaskState>;

    async fn update_workflow_status(&self, workflow_exec_id: &WorkflowExecID, org_id: &OrgID, status: Status) -> Result<()>;
}

/// Signal delivery and the `state` query handler exposed to operators (§6.3).
#[async_trait]
pub trait SignalChannel: Send + Sync {
    async fn send(&self, workflow_exec_id: &WorkflowExecID, signal: WorkflowSignal) -> Result<()>;
    async fn query_state(&self, workflow_exec_id: &WorkflowExecID) -> Result<String>;
}

#[async_trait]
pub trait DurableWorkflowHost: Send + Sync {
    async fn start_workflow(&self, workflow_config: WorkflowConfig, input: Value, org_id: OrgID) -> Result<WorkflowExecID>;
}

/// In-process implementation: one `tokio` task per running workflow, a
/// `HashMap` registry of signal gates keyed by `workflow_exec_id`, durability
/// via the state repositories.
pub struct InProcessDurableHost {
    gates: Arc<RwLock<HashMap<WorkflowExecID, Arc<SignalGate>>>>,
    activity: Arc<dyn Activity>,
    orchestrator: Arc<Orchestrator>,
    task_repo: Arc<TaskStateRepository>,
    #[allow(dead_code)]
    workflow_repo: Arc<WorkflowStateRepository>,
    response_handler: Arc<ResponseHandler>,
    options: ActivityOptions,
}

impl InProcessDurableHost {
    pub fn new(
        activity: Arc<dyn Activity>,
        orchestrator: Arc<Orchestrator>,
        workflow_repo: Arc<WorkflowStateRepository>,
        task_repo: Arc<TaskStateRepository>,
        response_handler: Arc<ResponseHandler>,
    ) -> Self {
        Self {
            gates: Arc::new(RwLock::new(HashMap::new())),
            activity,
            orchestrator,
            task_repo,
            workflow_repo,
            response_handler,
            options: ActivityOptions::default(),
        }
    }

    async fn run_workflow_body(self: Arc<Self>, workflow_config: WorkflowConfig, workflow_state: WorkflowState, org_id: OrgID, gate: Arc<SignalGate>) {
        let workflow_exec_id = workflow_state.workflow_exec_id.clone();
        let mut index = 0usize;

        loop {
            gate.await_unpaused().await;
            if gate.is_canceled().await {
                let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Canceled).await;
                break;
            }
            let Some(task_config) = workflow_config.tasks.get(index) else {
                let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Success).await;
                break;
            };

            match self.run_one_task(&workflow_config, &workflow_state, task_config, &org_id, None).await {
                Ok(NextAction::Continue) => index += 1,
                Ok(NextAction::Goto(next_id)) => match workflow_config.tasks.iter().position(|t| t.id == next_id) {
                    Some(pos) => index = pos,
                    None => {
                        error!(task_id = %next_id, "transition targets a task outside the top-level sequence, stopping workflow");
                        let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Failed).await;
                        break;
                    }
                },
                Ok(NextAction::Stop) => {
                    let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Success).await;
                    break;
                }
                Ok(NextAction::Fail) => {
                    let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Failed).await;
                    break;
                }
                Err(err) => {
                    error!(task_id = %task_config.id, error = %err, "task activity failed permanently");
                    let _ = self.activity.update_workflow_status(&workflow_exec_id, &org_id, Status::Failed).await;
                    break;
                }
            }
        }

        self.gates.write().await.remove(&workflow_exec_id);
    }

    /// Runs one task to completion and returns the `NextAction` the caller
    /// (the top-level loop, or this same method recursing into a parent's
    /// children) should take. `parent` carries the parent's task id and
    /// `task_exec_id` when this call is itself a fanned-out child.
    ///
    /// Boxed because a fan-out task's children are run by this same method —
    /// plain `async fn` can't recurse on itself without indirection.
    fn run_one_task<'a>(
        self: &'a Arc<Self>,
        workflow_config: &'a WorkflowConfig,
        workflow_state: &'a WorkflowState,
        task_config: &'a TaskConfig,
        org_id: &'a OrgID,
        parent: Option<(&'a str, TaskExecID)>,
    ) -> Pin<Box<dyn Future<Output = Result<NextAction>> + Send + 'a>> {
        Box::pin(async move {
            let parent_task_id = parent.as_ref().map(|(id, _)| *id);
            let (ctx, normalized) = self.orchestrator.normalize_task(workflow_state, workflow_config, task_config, parent_task_id)?;
            let (component, execution_type) = component_and_execution_type(task_config)?;
            let resolved_type = task_config.resolved_type().unwrap_or(TaskType::Basic);

            let mut pending = TaskState::new(
                task_config.id.clone(),
                workflow_state.workflow_exec_id.clone(),
                org_id.clone(),
                component,
                execution_type,
                normalized.with.clone(),
            );
            if let Some((_, parent_exec_id)) = &parent {
                pending.parent_state_id = Some(parent_exec_id.clone());
            }

            if matches!(resolved_type, TaskType::Parallel | TaskType::Collection | TaskType::Composite) {
                return self.run_fan_out(workflow_config, workflow_state, task_config, org_id, resolved_type, pending, ctx).await;
            }

            pending.agent_id = task_config.agent.clone();
            pending.tool_id = task_config.tool.clone();
            pending.action_id = task_config.action.clone();
            pending.status = Status::Running;
            self.task_repo.upsert(&pending).await?;

            let finished = execute_with_retry(self.options.retry_policy, {
                let activity = self.activity.clone();
                let ctx = ctx.clone();
                let pending = pending.clone();
                move || {
                    let activity = activity.clone();
                    let ctx = ctx.clone();
                    let pending = pending.clone();
                    async move { activity.execute_task(&ctx, pending).await }
                }
            })
            .await?;

            let response = self.response_handler.handle(task_config, workflow_state, finished, &ctx).await?;
            Ok(response.next_action)
        })
    }

    /// Drives a parallel/collection/composite task's children through the
    /// bounded `ParallelRunner`, then feeds the rolled-up result back through
    /// the shared response handler so the parent gets the same
    /// persist/recompute-parent/resolve-transition treatment a leaf task
    /// gets (§4.8, §4.10).
    async fn run_fan_out(
        self: &Arc<Self>,
        workflow_config: &WorkflowConfig,
        workflow_state: &WorkflowState,
        task_config: &TaskConfig,
        org_id: &OrgID,
        resolved_type: TaskType,
        mut pending: TaskState,
        ctx: NormalizationContext,
    ) -> Result<NextAction> {
        let children: Vec<TaskConfig> = match resolved_type {
            TaskType::Collection => self.orchestrator.expand_collection(&ctx)?,
            _ => task_config.tasks.clone(),
        };

        pending.parallel_state = Some(serde_json::json!({
            "child_ids": children.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
        }));
        pending.status = Status::Running;
        self.task_repo.upsert(&pending).await?;

        if children.is_empty() {
            pending.status = Status::Success;
            pending.output = Some(Value::Object(serde_json::Map::new()));
            let response = self.response_handler.handle(task_config, workflow_state, pending, &ctx).await?;
            return Ok(response.next_action);
        }

        let max_workers = task_config.resolved_max_workers(resolved_type);
        let strategy_for_children = task_config.resolved_strategy();
        let parent_task_id = task_config.id.clone();
        let parent_exec_id = pending.task_exec_id.clone();
        let children_by_id: Arc<HashMap<String, TaskConfig>> =
            Arc::new(children.into_iter().map(|c| (c.id.clone(), c)).collect());
        let task_ids: Vec<String> = children_by_id.keys().cloned().collect();

        let run_one = {
            let host = self.clone();
            let workflow_config = workflow_config.clone();
            let workflow_state = workflow_state.clone();
            let org_id = org_id.clone();
            let children_by_id = children_by_id.clone();
            let parent_task_id = parent_task_id.clone();
            let parent_exec_id = parent_exec_id.clone();
            move |task_id: String| {
                let host = host.clone();
                let workflow_config = workflow_config.clone();
                let workflow_state = workflow_state.clone();
                let org_id = org_id.clone();
                let children_by_id = children_by_id.clone();
                let parent_task_id = parent_task_id.clone();
                let parent_exec_id = parent_exec_id.clone();
                async move {
                    let Some(child_config) = children_by_id.get(&task_id) else {
                        return ChildOutcome { task_id, status: Status::Failed };
                    };
                    let status = match host
                        .run_one_task(&workflow_config, &workflow_state, child_config, &org_id, Some((parent_task_id.as_str(), parent_exec_id)))
                        .await
                    {
                        Ok(NextAction::Fail) => Status::Failed,
                        Ok(_) => Status::Success,
                        Err(err) => {
                            error!(task_id = %task_id, error = %err, "fanned-out child task failed permanently");
                            Status::Failed
                        }
                    };
                    ChildOutcome { task_id, status }
                }
            }
        };

        let runner = ParallelRunner::new(max_workers);
        let rollup = runner.run(task_ids, strategy_for_children, run_one).await;

        for canceled_id in &rollup.cancel_task_ids {
            if let Ok(rows) = self.task_repo.list(org_id, None, Some(canceled_id.clone()), None, None, Some(&parent_exec_id)).await {
                for row in rows.iter().filter(|r| !r.status.is_terminal()) {
                    let _ = self.task_repo.update_status(&row.task_exec_id, &row.org_id, Status::Canceled).await;
                }
            }
        }

        let children_state = self.task_repo.list(org_id, None, None, None, None, Some(&parent_exec_id)).await?;
        let output: serde_json::Map<String, Value> = children_state
            .iter()
            .map(|c| (c.task_id.clone(), c.output.clone().unwrap_or(Value::Null)))
            .collect();

        pending.status = rollup.parent_status;
        pending.output = Some(Value::Object(output));
        let response = self.response_handler.handle(task_config, workflow_state, pending, &ctx).await?;
        Ok(response.next_action)
    }
}

#[async_trait]
impl DurableWorkflowHost for InProcessDurableHost {
    async fn start_workflow(&self, workflow_config: WorkflowConfig, input: Value, org_id: OrgID) -> Result<WorkflowExecID> {
        self.orchestrator.clear_cache();

        let workflow_state = execute_with_retry(self.options.retry_policy, {
            let activity = self.activity.clone();
            let workflow_config = workflow_config.clone();
            let input = input.clone();
            let org_id = org_id.clone();
            move || {
                let activity = activity.clone();
                let workflow_config = workflow_config.clone();
                let input = input.clone();
                let org_id = org_id.clone();
                async move { activity.trigger(&workflow_config, input, &org_id).await }
            }
        })
        .await?;

        let workflow_exec_id = workflow_state.workflow_exec_id.clone();
        let gate = Arc::new(SignalGate::new());
        self.gates.write().await.insert(workflow_exec_id.clone(), gate.clone());

        let this = Arc::new(Self {
            gates: self.gates.clone(),
            activity: self.activity.clone(),
            orchestrator: self.orchestrator.clone(),
            task_repo: self.task_repo.clone(),
            workflow_repo: self.workflow_repo.clone(),
            response_handler: self.response_handler.clone(),
            options: self.options,
        });
        tokio::spawn(this.run_workflow_body(workflow_config, workflow_state, org_id, gate));

        info!(workflow_exec_id = %workflow_exec_id, "workflow started");
        Ok(workflow_exec_id)
    }
}

#[async_trait]
impl SignalChannel for InProcessDurableHost {
    async fn send(&self, workflow_exec_id: &WorkflowExecID, signal: WorkflowSignal) -> Result<()> {
        let gates = self.gates.read().await;
        let Some(gate) = gates.get(workflow_exec_id) else {
            return Err(CompozyError::not_found(format!("no running workflow {workflow_exec_id}")));
        };
        match signal {
            WorkflowSignal::Pause => gate.pause().await,
            WorkflowSignal::Resume => gate.resume().await,
            WorkflowSignal::Cancel => gate.cancel().await,
        }
        Ok(())
    }

    async fn query_state(&self, workflow_exec_id: &WorkflowExecID) -> Result<String> {
        let gates = self.gates.read().await;
        let gate = gates.get(workflow_exec_id).ok_or_else(|| CompozyError::not_found(format!("no running workflow {workflow_exec_id}")))?;
        Ok(match gate.state().await {
            GateState::Paused => "paused".to_string(),
            GateState::Running => "running".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_defaults_match_the_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.coefficient, 2.0);
        assert_eq!(policy.max_interval, Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 3);
    }

    #[tokio::test]
    async fn execute_with_retry_stops_on_non_retriable_error() {
        let mut attempts = 0;
        let result: Result<()> = execute_with_retry(RetryPolicy { initial_interval: Duration::from_millis(1), ..Default::default() }, || {
            attempts += 1;
            async move { Err(CompozyError::validation("bad config")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn execute_with_retry_gives_up_after_max_attempts() {
        let mut attempts = 0;
        let policy = RetryPolicy { initial_interval: Duration::from_millis(1), max_interval: Duration::from_millis(2), max_attempts: 3, coefficient: 2.0 };
        let result: Result<()> = execute_with_retry(policy, || {
            attempts += 1;
            async move { Err(CompozyError::Transient { message: "down".to_string() }) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn component_mapping_distinguishes_agent_and_tool_basics() {
        let mut agent_task = TaskConfig::new("a");
        agent_task.agent = Some("researcher".to_string());
        assert_eq!(component_and_execution_type(&agent_task).unwrap(), (Component::Agent, ExecutionType::Basic));

        let mut tool_task = TaskConfig::new("t");
        tool_task.tool = Some("search".to_string());
        assert_eq!(component_and_execution_type(&tool_task).unwrap(), (Component::Tool, ExecutionType::Basic));

        let plain = TaskConfig::new("p");
        assert_eq!(component_and_execution_type(&plain).unwrap(), (Component::Basic, ExecutionType::Basic));
    }
}
