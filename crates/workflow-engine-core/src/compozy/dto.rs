//! Execution DTOs surfaced at the API boundary (§6.4): the shape external
//! callers see for a workflow or task execution, plus the ETag/If-Match
//! machinery governing conditional reads and writes.
//!
//! ETags are strong, derived deterministically from the stored resource
//! representation — a SHA-256 digest of its canonical JSON encoding, the
//! same hashing crate the teacher already uses for content fingerprints
//! (`ai::templates::storage::calculate_hash`).

use super::error::ErrorDetail;
use super::ids::{TaskExecID, WorkflowExecID};
use super::state::{Status, TaskState, UsageSummary, WorkflowState};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical, `exec_id`/`status`/`usage`/`output`/`error` view of one
/// execution (workflow or task), with the ETag it hashes to.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionDto {
    pub exec_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage: Vec<UsageSummary>,
    pub output: Option<Value>,
    pub error: Option<ErrorDetail>,
    pub etag: String,
}

impl ExecutionDto {
    pub fn from_workflow_state(state: &WorkflowState, usage: Vec<UsageSummary>) -> Self {
        Self::new(state.workflow_exec_id.to_string(), state.status, usage, state.output.clone(), state.error.clone())
    }

    pub fn from_task_state(state: &TaskState, usage: Vec<UsageSummary>) -> Self {
        Self::new(state.task_exec_id.to_string(), state.status, usage, state.output.clone(), state.error.clone())
    }

    fn new(exec_id: String, status: Status, usage: Vec<UsageSummary>, output: Option<Value>, error: Option<ErrorDetail>) -> Self {
        let etag = compute_etag(&exec_id, status, &usage, &output, &error);
        Self { exec_id, status, usage, output, error, etag }
    }

    /// `If-Match` semantics (§6.4 S2): whether `candidate` (with or without
    /// the surrounding quotes HTTP clients send) matches this DTO's ETag.
    pub fn matches_etag(&self, candidate: &str) -> bool {
        self.etag == candidate.trim_matches('"')
    }
}

#[derive(Serialize)]
struct EtagPayload<'a> {
    exec_id: &'a str,
    status: Status,
    usage: &'a [UsageSummary],
    output: &'a Option<Value>,
    error: &'a Option<ErrorDetail>,
}

fn compute_etag(exec_id: &str, status: Status, usage: &[UsageSummary], output: &Option<Value>, error: &Option<ErrorDetail>) -> String {
    let payload = EtagPayload { exec_id, status, usage, output, error };
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Marker trait implemented by the two execution-id newtypes, so callers
/// don't need to pick a constructor by hand when generic over exec kind.
pub trait ExecId {
    fn dto_exec_id(&self) -> String;
}

impl ExecId for WorkflowExecID {
    fn dto_exec_id(&self) -> String {
        self.to_string()
    }
}

impl ExecId for TaskExecID {
    fn dto_exec_id(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compozy::ids::OrgID;
    use serde_json::json;

    #[test]
    fn etag_is_stable_for_identical_content() {
        let state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let a = ExecutionDto::from_workflow_state(&state, vec![]);
        let b = ExecutionDto::from_workflow_state(&state, vec![]);
        assert_eq!(a.etag, b.etag);
        assert_eq!(a.etag.len(), 64);
    }

    #[test]
    fn etag_changes_when_output_changes() {
        let mut state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let before = ExecutionDto::from_workflow_state(&state, vec![]);
        state.output = Some(json!({"result": "done"}));
        let after = ExecutionDto::from_workflow_state(&state, vec![]);
        assert_ne!(before.etag, after.etag);
    }

    #[test]
    fn matches_etag_ignores_surrounding_quotes() {
        let state = WorkflowState::new("wf", OrgID::new(), json!({}));
        let dto = ExecutionDto::from_workflow_state(&state, vec![]);
        assert!(dto.matches_etag(&format!("\"{}\"", dto.etag)));
        assert!(!dto.matches_etag("\"stale\""));
    }
}
