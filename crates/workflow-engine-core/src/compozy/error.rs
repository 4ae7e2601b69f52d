//! Error taxonomy for the compozy task & workflow execution engine.
//!
//! Every variant here maps to one of the error *kinds* the orchestrator and
//! durable host reason about (retriable vs. not, which HTTP status it maps
//! to, whether it fails only the task or the whole workflow).

use thiserror::Error;

/// Structured error object surfaced to API callers: `{ code, message, details? }`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

#[derive(Debug, Error)]
pub enum CompozyError {
    /// Invalid task config, unknown task type, missing required field. Never retried.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Missing workflow/task state.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// ETag mismatch / stale If-Match, or a composite primary key violation.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Evaluation failure in a `with`/`outputs`/transition block.
    #[error("template error in field `{field}`: {message}")]
    Template { field: String, message: String },

    /// `CompleteWorkflow` invoked while children still run.
    #[error("workflow not ready: {message}")]
    WorkflowNotReady { message: String },

    /// Wait task `OnTimeout` fired.
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Observed via context cancellation.
    #[error("canceled: {message}")]
    Canceled { message: String },

    /// Wrapped I/O error from the repository or external host; retriable.
    #[error("transient error: {message}")]
    Transient { message: String },

    /// Unknown task type presented to the factory.
    #[error("unsupported task type: {task_type}")]
    UnsupportedType { task_type: String },

    /// Output-transformer field evaluation failure.
    #[error("failed to transform task output field `{field}`: {message}")]
    OutputTransform { field: String, message: String },
}

impl CompozyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn template(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template { field: field.into(), message: message.into() }
    }

    /// Whether the activity retry policy should retry this error.
    ///
    /// `Validation`, `UnsupportedType` and `WorkflowNotReady` are never retried:
    /// the first two are structurally wrong and retrying changes nothing, and
    /// `WorkflowNotReady` is resolved by waiting for a child completion event,
    /// not by blind retry.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            CompozyError::Validation { .. }
                | CompozyError::UnsupportedType { .. }
                | CompozyError::WorkflowNotReady { .. }
        )
    }

    /// HTTP status this error kind maps to at the API boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            CompozyError::Validation { .. } => 400,
            CompozyError::NotFound { .. } => 404,
            CompozyError::Conflict { .. } => 412,
            CompozyError::Template { .. } => 422,
            CompozyError::WorkflowNotReady { .. } => 409,
            CompozyError::Timeout { .. } => 504,
            CompozyError::Canceled { .. } => 499,
            CompozyError::Transient { .. } => 503,
            CompozyError::UnsupportedType { .. } => 400,
            CompozyError::OutputTransform { .. } => 422,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CompozyError::Validation { .. } => "VALIDATION_ERROR",
            CompozyError::NotFound { .. } => "NOT_FOUND",
            CompozyError::Conflict { .. } => "CONFLICT",
            CompozyError::Template { .. } => "TEMPLATE_ERROR",
            CompozyError::WorkflowNotReady { .. } => "WORKFLOW_NOT_READY",
            CompozyError::Timeout { .. } => "TIMEOUT",
            CompozyError::Canceled { .. } => "CANCELED",
            CompozyError::Transient { .. } => "TRANSIENT_ERROR",
            CompozyError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            CompozyError::OutputTransform { .. } => "OUTPUT_TRANSFORM_ERROR",
        }
    }

    /// Converts to the structured, user-visible error object.
    pub fn to_detail(&self, task_id: Option<String>) -> ErrorDetail {
        let field_path = match self {
            CompozyError::Template { field, .. } | CompozyError::OutputTransform { field, .. } => {
                Some(field.clone())
            }
            _ => None,
        };
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
            task_id,
            field_path,
        }
    }
}

impl From<handlebars::RenderError> for CompozyError {
    fn from(err: handlebars::RenderError) -> Self {
        CompozyError::Template { field: "unknown".to_string(), message: err.to_string() }
    }
}

impl From<handlebars::TemplateError> for CompozyError {
    fn from(err: handlebars::TemplateError) -> Self {
        CompozyError::Template { field: "unknown".to_string(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for CompozyError {
    fn from(err: serde_json::Error) -> Self {
        CompozyError::Validation { message: format!("serialization error: {err}") }
    }
}

impl From<diesel::result::Error> for CompozyError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => CompozyError::NotFound { message: "row not found".to_string() },
            diesel::result::Error::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, info) => {
                CompozyError::Conflict { message: info.message().to_string() }
            }
            other => CompozyError::Transient { message: other.to_string() },
        }
    }
}


/// Convenience alias matching `error::Result` already exported elsewhere in this crate.
pub type Result<T> = std::result::Result<T, CompozyError>;
