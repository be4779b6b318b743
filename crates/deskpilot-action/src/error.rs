//! Error types for action dispatch, execution, and task scheduling.

use crate::types::{ActionKind, ResponseError, TaskStatus};
use deskpilot_core::error::DeskpilotError;
use uuid::Uuid;

/// Errors delivered through the action dispatch queue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Request id already outstanding: {0}")]
    DuplicateRequest(String),
    #[error("Connection closed before a result arrived: {0}")]
    ConnectionClosed(String),
    #[error("Dispatch queue is closed")]
    QueueClosed,
    #[error("Dispatch queue shutting down: {0}")]
    ShuttingDown(String),
    #[error("Action execution failed: {message}")]
    ExecutionFailed {
        message: String,
        detail: Option<String>,
    },
}

impl DispatchError {
    /// Stable machine-readable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::DuplicateRequest(_) => "duplicate_request",
            DispatchError::ConnectionClosed(_) => "connection_closed",
            DispatchError::QueueClosed => "queue_closed",
            DispatchError::ShuttingDown(_) => "shutting_down",
            DispatchError::ExecutionFailed { .. } => "execution_failed",
        }
    }

    pub fn to_response_error(&self) -> ResponseError {
        let (message, detail) = match self {
            DispatchError::ExecutionFailed { message, detail } => {
                (message.clone(), detail.clone())
            }
            other => (other.to_string(), None),
        };
        ResponseError {
            code: self.code().to_string(),
            message,
            detail,
        }
    }
}

/// Errors from executing a single action against the desktop.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action not supported by this executor: {0}")]
    Unsupported(ActionKind),
    #[error("Payload validation failed: {0}")]
    InvalidPayload(String),
    #[error("Action handler failed: {0}")]
    HandlerFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from task lifecycle management.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(TaskStatus, TaskStatus),
    #[error("Task {id} changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        id: Uuid,
        expected: TaskStatus,
        actual: TaskStatus,
    },
    #[error("Storage error: {0}")]
    Storage(#[from] DeskpilotError),
}

/// Errors from the task scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Failed to write task file {path}: {reason}")]
    FileWriteFailed { path: String, reason: String },
    #[error("Task store error: {0}")]
    Store(#[from] TaskError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::DuplicateRequest("a1".to_string());
        assert_eq!(err.to_string(), "Request id already outstanding: a1");

        let err = DispatchError::ConnectionClosed("conn-1".to_string());
        assert_eq!(
            err.to_string(),
            "Connection closed before a result arrived: conn-1"
        );

        assert_eq!(DispatchError::QueueClosed.to_string(), "Dispatch queue is closed");

        let err = DispatchError::ShuttingDown("server stopping".to_string());
        assert_eq!(err.to_string(), "Dispatch queue shutting down: server stopping");
    }

    #[test]
    fn test_dispatch_error_codes_are_distinct() {
        let errors = [
            DispatchError::DuplicateRequest(String::new()),
            DispatchError::ConnectionClosed(String::new()),
            DispatchError::QueueClosed,
            DispatchError::ShuttingDown(String::new()),
            DispatchError::ExecutionFailed {
                message: String::new(),
                detail: None,
            },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_execution_failed_keeps_message_and_detail_on_the_wire() {
        let err = DispatchError::ExecutionFailed {
            message: "xdotool exited 1".to_string(),
            detail: Some("HandlerFailed(..)".to_string()),
        };
        let wire = err.to_response_error();
        assert_eq!(wire.code, "execution_failed");
        assert_eq!(wire.message, "xdotool exited 1");
        assert_eq!(wire.detail.as_deref(), Some("HandlerFailed(..)"));
    }

    #[test]
    fn test_other_errors_use_display_as_wire_message() {
        let wire = DispatchError::QueueClosed.to_response_error();
        assert_eq!(wire.code, "queue_closed");
        assert_eq!(wire.message, "Dispatch queue is closed");
        assert!(wire.detail.is_none());
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::Unsupported(ActionKind::Application);
        assert_eq!(
            err.to_string(),
            "Action not supported by this executor: application"
        );

        let err = ActionError::InvalidPayload("bad base64".to_string());
        assert_eq!(err.to_string(), "Payload validation failed: bad base64");
    }

    #[test]
    fn test_task_error_display() {
        let id = Uuid::new_v4();
        let err = TaskError::NotFound(id);
        assert_eq!(err.to_string(), format!("Task not found: {}", id));

        let err = TaskError::InvalidTransition(TaskStatus::Completed, TaskStatus::Running);
        assert_eq!(err.to_string(), "Invalid state transition: completed -> running");

        let err = TaskError::StatusConflict {
            id,
            expected: TaskStatus::ScheduledWait,
            actual: TaskStatus::Cancelled,
        };
        assert!(err.to_string().contains("expected scheduled_wait, found cancelled"));
    }

    #[test]
    fn test_task_error_from_deskpilot_error() {
        let err: TaskError = DeskpilotError::Storage("corrupt".to_string()).into();
        assert!(matches!(err, TaskError::Storage(_)));
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::FileWriteFailed {
            path: "Desktop/report.pdf".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write task file Desktop/report.pdf: disk full"
        );

        let err: SchedulerError = TaskError::NotFound(Uuid::nil()).into();
        assert!(matches!(err, SchedulerError::Store(_)));
    }
}
