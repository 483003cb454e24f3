use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Application-wide error type.
///
/// Variants map onto the error kinds a caller needs to distinguish: a bad
/// request never touches storage, a transient failure is retryable, a fatal
/// one means the execution it belongs to must be marked failed.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("permanent error: {0}")]
    Permanent(String),

    #[error("data shape error: {0}")]
    DataShape(String),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_id: Option<String>,
}

impl ApiError {
    pub fn validation_error(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn forbidden() -> Self {
        ApiError::Unauthorized
    }

    /// Attaches an execution_id to whatever error kind is returned, so the
    /// client can correlate the failure against `AuditLog`.
    pub fn with_execution(self, execution_id: impl Into<String>) -> ApiErrorWithExecution {
        ApiErrorWithExecution { inner: self, execution_id: execution_id.into() }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::Transient(_) => "transient",
            ApiError::Permanent(_) => "permanent",
            ApiError::DataShape(_) => "data_shape",
            ApiError::Concurrency(_) => "concurrency",
            ApiError::Fatal(_) => "fatal",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Database(_) => "fatal",
            ApiError::Internal(_) => "fatal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Permanent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DataShape(_) => StatusCode::OK,
            ApiError::Concurrency(_) => StatusCode::CONFLICT,
            ApiError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        let body = ErrorBody { error: self.to_string(), kind: self.kind(), execution_id: None };
        (status, Json(body)).into_response()
    }
}

/// Wraps an [`ApiError`] with an `execution_id` for responses produced while
/// running a specific workflow.
pub struct ApiErrorWithExecution {
    inner: ApiError,
    execution_id: String,
}

impl IntoResponse for ApiErrorWithExecution {
    fn into_response(self) -> Response {
        let status = self.inner.status();
        let body = ErrorBody {
            error: self.inner.to_string(),
            kind: self.inner.kind(),
            execution_id: Some(self.execution_id),
        };
        (status, Json(body)).into_response()
    }
}

/// Detects connection-class failures that should be swallowed by callers
/// doing best-effort writes (audit logs, metrics) rather than propagated as
/// fatal. Mirrors the original's string-matching heuristic over driver error
/// text: `"connection"`, `"closed"`, `"disconnected"`, `"does not exist"`.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    let text = err.to_string().to_lowercase();
    ["connection", "closed", "disconnected", "does not exist"]
        .iter()
        .any(|needle| text.contains(needle))
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}
