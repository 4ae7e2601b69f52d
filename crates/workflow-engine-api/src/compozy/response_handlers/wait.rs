//! Wait response handler (§4.10): the base contract plus wait-specific
//! concerns — logging a received `.signal` payload and surfacing timeouts.

use serde_json::Value;
use tracing::info;
use workflow_engine_core::compozy::error::CompozyError;
use workflow_engine_core::compozy::state::{Status, TaskState};

/// Logs the `.signal` payload carried by a wait task's completion, if any.
/// Called by the durable host right before handing the state to
/// [`super::base::ResponseHandler::handle`].
pub fn log_signal_payload(task_state: &TaskState, signal: Option<&Value>) {
    if let Some(signal) = signal {
        info!(task_id = %task_state.task_id, task_exec_id = %task_state.task_exec_id, signal = %signal, "wait task received signal");
    }
}

/// Maps a wait task's terminal status to its response, surfacing a
/// `TimeoutError` distinctly from an ordinary failure so the host's retry
/// policy and the API's HTTP status mapping can tell the two apart.
pub fn check_timeout(task_state: &TaskState) -> Result<(), CompozyError> {
    if task_state.status != Status::Failed {
        return Ok(());
    }
    let timed_out = task_state
        .error
        .as_ref()
        .map(|e| e.code == "TIMEOUT")
        .unwrap_or(false);
    if timed_out {
        let message = task_state.error.as_ref().map(|e| e.message.clone()).unwrap_or_else(|| "wait task timed out".to_string());
        return Err(CompozyError::Timeout { message });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow_engine_core::compozy::error::ErrorDetail;
    use workflow_engine_core::compozy::ids::OrgID;
    use workflow_engine_core::compozy::state::{Component, ExecutionType};

    #[test]
    fn non_timeout_failure_passes_through() {
        let wf_id = workflow_engine_core::compozy::ids::WorkflowExecID::new();
        let mut state = TaskState::new("wait1", wf_id, OrgID::new(), Component::Wait, ExecutionType::Basic, Value::Null);
        state.status = Status::Failed;
        state.error = Some(ErrorDetail { code: "VALIDATION_ERROR".to_string(), message: "bad config".to_string(), details: None, task_id: None, field_path: None });
        assert!(check_timeout(&state).is_ok());
    }

    #[test]
    fn timeout_error_code_surfaces_as_timeout() {
        let wf_id = workflow_engine_core::compozy::ids::WorkflowExecID::new();
        let mut state = TaskState::new("wait1", wf_id, OrgID::new(), Component::Wait, ExecutionType::Basic, Value::Null);
        state.status = Status::Failed;
        state.error = Some(ErrorDetail { code: "TIMEOUT".to_string(), message: "deadline exceeded".to_string(), details: None, task_id: None, field_path: None });
        let result = check_timeout(&state);
        assert!(matches!(result, Err(CompozyError::Timeout { .. })));
    }
}
