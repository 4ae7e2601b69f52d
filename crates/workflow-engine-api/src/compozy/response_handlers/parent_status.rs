//! Parent status manager (§4.10 step 3): recomputes a parent task's status
//! from its siblings after one of them finalizes, using the same rollup rules
//! collection/parallel expansion uses (§4.8).

use crate::compozy::repositories::TaskStateRepository;
use workflow_engine_core::compozy::config::Strategy;
use workflow_engine_core::compozy::error::Result;
use workflow_engine_core::compozy::ids::{OrgID, TaskExecID};
use workflow_engine_core::compozy::state::{Status, TaskState};
use workflow_engine_core::compozy::strategy::{self, ChildOutcome, RollupOutcome};

/// Recomputes the parent's status given its current children. Returns
/// `None` when the strategy isn't ready to roll up yet (more children still
/// running); the caller should leave the parent untouched in that case.
/// Returns the sibling rows alongside the rollup so the caller can resolve
/// `RollupOutcome::cancel_task_ids` (task ids) to the `task_exec_id`s
/// `TaskStateRepository::update_status` needs, without a second query.
pub async fn recompute(
    task_repo: &TaskStateRepository,
    parent_task_exec_id: &TaskExecID,
    org_id: &OrgID,
    strategy_for_parent: Strategy,
) -> Result<Option<(RollupOutcome, Vec<TaskState>)>> {
    let siblings = task_repo.list(org_id, None, None, None, None, Some(parent_task_exec_id)).await?;
    let outcomes: Vec<ChildOutcome> = siblings.iter().map(|s| ChildOutcome { task_id: s.task_id.clone(), status: s.status }).collect();

    if !strategy::is_ready_to_rollup(strategy_for_parent, &outcomes) {
        return Ok(None);
    }
    let outcome = strategy::rollup(strategy_for_parent, &outcomes);
    Ok(Some((outcome, siblings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_engine_core::compozy::strategy::ChildOutcome as Outcome;

    #[test]
    fn wait_all_is_not_ready_while_a_sibling_runs() {
        let outcomes = vec![
            Outcome { task_id: "a".to_string(), status: Status::Success },
            Outcome { task_id: "b".to_string(), status: Status::Running },
        ];
        assert!(!strategy::is_ready_to_rollup(Strategy::WaitAll, &outcomes));
    }
}
