//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use deskpilot_action::{DispatchError, TaskError};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    #[error("{0}")]
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// 409 Conflict - state conflict (e.g., task already finished).
    #[error("{0}")]
    Conflict(String),
    /// 422 Unprocessable Entity - valid syntax but semantic validation failure.
    #[error("{0}")]
    UnprocessableEntity(String),
    /// 500 Internal Server Error - unexpected server error.
    #[error("{0}")]
    Internal(String),
    /// 503 Service Unavailable - the dispatch queue is closed.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::UnprocessableEntity(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let body = ErrorBody {
            error: error_code.to_string(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match &err {
            TaskError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TaskError::InvalidTransition(..) | TaskError::StatusConflict { .. } => {
                ApiError::Conflict(err.to_string())
            }
            TaskError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match &err {
            DispatchError::DuplicateRequest(_) => ApiError::Conflict(err.to_string()),
            DispatchError::QueueClosed | DispatchError::ShuttingDown(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_action::TaskStatus;
    use uuid::Uuid;

    #[test]
    fn test_task_errors_map_to_status_codes() {
        let err: ApiError = TaskError::NotFound(Uuid::nil()).into();
        assert_eq!(err.parts().0, StatusCode::NOT_FOUND);

        let err: ApiError =
            TaskError::InvalidTransition(TaskStatus::Completed, TaskStatus::Cancelled).into();
        assert_eq!(err.parts().0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_dispatch_errors_map_to_status_codes() {
        let err: ApiError = DispatchError::DuplicateRequest("a1".to_string()).into();
        assert_eq!(err.parts(), (StatusCode::CONFLICT, "conflict"));

        let err: ApiError = DispatchError::QueueClosed.into();
        assert_eq!(err.parts().0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "Dispatch queue is closed");
    }
}
