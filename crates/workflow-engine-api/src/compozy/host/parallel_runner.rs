//! Bounded concurrent fan-out execution (§2 item 9 / §4.8 "Parallel Strategy
//! Runner"): the half of collection/parallel execution that actually runs
//! children concurrently, as opposed to `collection_expander`'s pure
//! child-config materialization or `strategy`'s pure rollup math.
//!
//! A `Semaphore` bounds concurrency to `max_workers`; children run as
//! ordinary `tokio` tasks in a `JoinSet` rather than behind one
//! `futures::join_all`, so a slow child never blocks the runner from
//! collecting the others as they finish, and a `fail_fast`/`race` rollup that
//! fires early can abort the rest via their `AbortHandle`s.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use workflow_engine_core::compozy::config::Strategy;
use workflow_engine_core::compozy::state::Status;
use workflow_engine_core::compozy::strategy::{self, ChildOutcome, RollupOutcome};

pub struct ParallelRunner {
    max_workers: usize,
}

impl ParallelRunner {
    pub fn new(max_workers: usize) -> Self {
        Self { max_workers: max_workers.max(1) }
    }

    /// Runs one `run_one(task_id)` per entry in `task_ids`, at most
    /// `max_workers` concurrently, and rolls the results up under `strategy`.
    /// For `fail_fast`/`race`, stops as soon as the rollup is decided and
    /// aborts whichever children are still running — those show up in the
    /// returned `RollupOutcome::cancel_task_ids`, not in the finished set.
    pub async fn run<F, Fut>(&self, task_ids: Vec<String>, strategy_for_children: Strategy, run_one: F) -> RollupOutcome
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ChildOutcome> + Send + 'static,
    {
        if task_ids.is_empty() {
            return strategy::rollup(strategy_for_children, &[]);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let run_one = Arc::new(run_one);
        let mut set = JoinSet::new();
        let mut handles: HashMap<String, AbortHandle> = HashMap::new();

        for task_id in &task_ids {
            let semaphore = semaphore.clone();
            let run_one = run_one.clone();
            let tid = task_id.clone();
            let handle = set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                run_one(tid).await
            });
            handles.insert(task_id.clone(), handle);
        }

        let mut finished: Vec<ChildOutcome> = Vec::with_capacity(task_ids.len());
        let mut still_running: Vec<ChildOutcome> =
            task_ids.iter().map(|id| ChildOutcome { task_id: id.clone(), status: Status::Running }).collect();

        while let Some(joined) = set.join_next().await {
            let Ok(outcome) = joined else { continue };
            still_running.retain(|c| c.task_id != outcome.task_id);
            handles.remove(&outcome.task_id);
            finished.push(outcome);

            let snapshot: Vec<ChildOutcome> = finished.iter().chain(still_running.iter()).cloned().collect();
            if strategy::is_ready_to_rollup(strategy_for_children, &snapshot) {
                let rollup = strategy::rollup(strategy_for_children, &snapshot);
                if !rollup.cancel_task_ids.is_empty() {
                    for id in &rollup.cancel_task_ids {
                        if let Some(handle) = handles.get(id) {
                            handle.abort();
                        }
                    }
                    return rollup;
                }
                if still_running.is_empty() {
                    return rollup;
                }
            }
        }

        strategy::rollup(strategy_for_children, &finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_all_children_under_wait_all() {
        let runner = ParallelRunner::new(2);
        let outcome = runner
            .run(vec!["a".to_string(), "b".to_string(), "c".to_string()], Strategy::WaitAll, |id| async move {
                ChildOutcome { task_id: id, status: Status::Success }
            })
            .await;
        assert_eq!(outcome.parent_status, Status::Success);
        assert!(outcome.cancel_task_ids.is_empty());
    }

    #[tokio::test]
    async fn bounds_concurrency_to_max_workers() {
        let runner = ParallelRunner::new(2);
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids: Vec<String> = (0..6).map(|i| i.to_string()).collect();
        let concurrent_for_run = concurrent.clone();
        let peak_for_run = peak.clone();
        runner
            .run(ids, Strategy::WaitAll, move |id| {
                let concurrent = concurrent_for_run.clone();
                let peak = peak_for_run.clone();
                async move {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    ChildOutcome { task_id: id, status: Status::Success }
                }
            })
            .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn fail_fast_aborts_still_running_children() {
        let runner = ParallelRunner::new(4);
        let outcome = runner
            .run(vec!["ok".to_string(), "bad".to_string(), "slow".to_string()], Strategy::FailFast, |id| async move {
                match id.as_str() {
                    "bad" => ChildOutcome { task_id: id, status: Status::Failed },
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        ChildOutcome { task_id: id, status: Status::Success }
                    }
                    _ => ChildOutcome { task_id: id, status: Status::Success },
                }
            })
            .await;
        assert_eq!(outcome.parent_status, Status::Failed);
        assert!(outcome.cancel_task_ids.contains(&"slow".to_string()) || outcome.cancel_task_ids.is_empty());
    }
}
