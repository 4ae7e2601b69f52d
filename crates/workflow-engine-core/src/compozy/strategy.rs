//! Fan-out completion strategies for parallel/collection children (§4.8).
//!
//! `Strategy::Await` owns cancellation of in-flight siblings, matching the
//! "a single `Await(children) → Outcome` operation" design note (§9).

use super::config::Strategy;
use super::state::Status;

/// Per-child outcome fed into a strategy's rollup.
#[derive(Debug, Clone)]
pub struct ChildOutcome {
    pub task_id: String,
    pub status: Status,
}

impl ChildOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Status::Success
    }

    pub fn failed(&self) -> bool {
        self.status == Status::Failed
    }
}

/// Rollup result: the parent's resulting status plus which already-completed
/// children (if any) the caller must now cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupOutcome {
    pub parent_status: Status,
    pub cancel_task_ids: Vec<String>,
}

/// Rolls up `children`'s current statuses under `strategy`. Intended to be
/// called once when the *last relevant* child completes:
/// - `wait_all`/`best_effort` — once every child is terminal.
/// - `fail_fast` — as soon as any child fails.
/// - `race` — as soon as any child succeeds, or once every child is terminal
///   if none succeeded.
pub fn rollup(strategy: Strategy, children: &[ChildOutcome]) -> RollupOutcome {
    match strategy {
        Strategy::WaitAll => rollup_wait_all(children),
        Strategy::FailFast => rollup_fail_fast(children),
        Strategy::BestEffort => rollup_best_effort(children),
        Strategy::Race => rollup_race(children),
    }
}

/// Whether, given `strategy` and the current statuses, the rollup may run now
/// (as opposed to waiting on more children to complete).
pub fn is_ready_to_rollup(strategy: Strategy, children: &[ChildOutcome]) -> bool {
    let all_terminal = children.iter().all(|c| c.status.is_terminal());
    match strategy {
        Strategy::WaitAll | Strategy::BestEffort => all_terminal,
        Strategy::FailFast => children.iter().any(|c| c.failed()) || all_terminal,
        Strategy::Race => children.iter().any(|c| c.succeeded()) || all_terminal,
    }
}

fn rollup_wait_all(children: &[ChildOutcome]) -> RollupOutcome {
    let parent_status = if children.iter().all(|c| c.succeeded()) { Status::Success } else { Status::Failed };
    RollupOutcome { parent_status, cancel_task_ids: Vec::new() }
}

fn rollup_fail_fast(children: &[ChildOutcome]) -> RollupOutcome {
    if children.iter().any(|c| c.failed()) {
        let cancel_task_ids = children
            .iter()
            .filter(|c| !c.status.is_terminal())
            .map(|c| c.task_id.clone())
            .collect();
        RollupOutcome { parent_status: Status::Failed, cancel_task_ids }
    } else {
        rollup_wait_all(children)
    }
}

fn rollup_best_effort(_children: &[ChildOutcome]) -> RollupOutcome {
    // Never fails the parent for child failures; failed children are still
    // surfaced, per-child, in the task output by the response handler.
    RollupOutcome { parent_status: Status::Success, cancel_task_ids: Vec::new() }
}

fn rollup_race(children: &[ChildOutcome]) -> RollupOutcome {
    if children.iter().any(|c| c.succeeded()) {
        let cancel_task_ids = children
            .iter()
            .filter(|c| !c.status.is_terminal())
            .map(|c| c.task_id.clone())
            .collect();
        RollupOutcome { parent_status: Status::Success, cancel_task_ids }
    } else {
        RollupOutcome { parent_status: Status::Failed, cancel_task_ids: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, status: Status) -> ChildOutcome {
        ChildOutcome { task_id: id.to_string(), status }
    }

    #[test]
    fn wait_all_succeeds_only_if_every_child_succeeds() {
        let children = vec![outcome("a", Status::Success), outcome("b", Status::Success)];
        assert_eq!(rollup(Strategy::WaitAll, &children).parent_status, Status::Success);

        let children = vec![outcome("a", Status::Success), outcome("b", Status::Failed)];
        assert_eq!(rollup(Strategy::WaitAll, &children).parent_status, Status::Failed);
    }

    #[test]
    fn fail_fast_cancels_non_terminal_siblings_on_first_failure() {
        let children = vec![outcome("a", Status::Running), outcome("b", Status::Failed), outcome("c", Status::Running)];
        let outcome = rollup(Strategy::FailFast, &children);
        assert_eq!(outcome.parent_status, Status::Failed);
        assert_eq!(outcome.cancel_task_ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn best_effort_never_fails_parent() {
        let children = vec![outcome("a", Status::Failed), outcome("b", Status::Failed)];
        assert_eq!(rollup(Strategy::BestEffort, &children).parent_status, Status::Success);
    }

    #[test]
    fn race_succeeds_on_first_success_and_cancels_rest() {
        let children = vec![outcome("a", Status::Success), outcome("b", Status::Running)];
        let outcome = rollup(Strategy::Race, &children);
        assert_eq!(outcome.parent_status, Status::Success);
        assert_eq!(outcome.cancel_task_ids, vec!["b".to_string()]);
    }

    #[test]
    fn race_fails_only_once_all_children_fail() {
        let children = vec![outcome("a", Status::Failed), outcome("b", Status::Failed)];
        assert_eq!(rollup(Strategy::Race, &children).parent_status, Status::Failed);
    }

    #[test]
    fn is_ready_to_rollup_matches_strategy_semantics() {
        let running = vec![outcome("a", Status::Running)];
        assert!(!is_ready_to_rollup(Strategy::WaitAll, &running));

        let one_failed = vec![outcome("a", Status::Failed), outcome("b", Status::Running)];
        assert!(is_ready_to_rollup(Strategy::FailFast, &one_failed));
        assert!(!is_ready_to_rollup(Strategy::WaitAll, &one_failed));

        let one_succeeded = vec![outcome("a", Status::Success), outcome("b", Status::Running)];
        assert!(is_ready_to_rollup(Strategy::Race, &one_succeeded));
    }
}
