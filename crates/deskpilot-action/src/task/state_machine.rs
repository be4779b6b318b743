//! Task state machine with validated transitions.
//!
//! Enforces the allowed state transitions for task lifecycle:
//! Pending -> Running -> Completed/Failed/NeedsHelp/NeedsReview
//! ScheduledWait -> Queued -> Running
//! any non-terminal -> Cancelled

use crate::error::TaskError;
use crate::types::TaskStatus;

/// Validate that a status transition is allowed.
///
/// Valid transitions:
/// - Pending -> Running
/// - ScheduledWait -> Queued
/// - Queued -> Running
/// - Running -> Completed, Failed, NeedsHelp, NeedsReview
/// - NeedsHelp / NeedsReview -> Running, Completed, Failed
/// - any non-terminal status -> Cancelled
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    let valid = matches!(
        (from, to),
        (TaskStatus::Pending, TaskStatus::Running)
            | (TaskStatus::ScheduledWait, TaskStatus::Queued)
            | (TaskStatus::Queued, TaskStatus::Running)
            | (TaskStatus::Running, TaskStatus::Completed)
            | (TaskStatus::Running, TaskStatus::Failed)
            | (TaskStatus::Running, TaskStatus::NeedsHelp)
            | (TaskStatus::Running, TaskStatus::NeedsReview)
            | (TaskStatus::NeedsHelp, TaskStatus::Running)
            | (TaskStatus::NeedsHelp, TaskStatus::Completed)
            | (TaskStatus::NeedsHelp, TaskStatus::Failed)
            | (TaskStatus::NeedsReview, TaskStatus::Running)
            | (TaskStatus::NeedsReview, TaskStatus::Completed)
            | (TaskStatus::NeedsReview, TaskStatus::Failed)
    ) || (to == TaskStatus::Cancelled && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition(from, to))
    }
}
