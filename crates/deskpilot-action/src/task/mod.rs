//! Task lifecycle management.
//!
//! The scheduler reads and updates tasks through the [`TaskStore`] trait;
//! [`InMemoryTaskStore`] is the implementation the binary runs with.

pub mod state_machine;

use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskpilot_core::clock::{Clock, SystemClock};
use deskpilot_core::error::DeskpilotError;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::TaskError;
use crate::task::state_machine::validate_transition;
use crate::types::{Task, TaskFile, TaskPriority, TaskStatus, TaskUpdate};

/// Persistence contract the scheduler works against.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// `ScheduledWait` tasks whose activation time is at or before `now`,
    /// earliest first.
    async fn find_due_scheduled_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, TaskError>;

    /// The ready task (`Pending` or `Queued`) that should run next: highest
    /// priority, then earliest `queued_at` (or `created_at`), then insertion order.
    async fn find_next_ready_task(&self) -> Result<Option<Task>, TaskError>;

    /// Apply a status write, honoring `update.expected` as a compare-and-set.
    async fn update_task_status(&self, id: Uuid, update: TaskUpdate) -> Result<Task, TaskError>;

    async fn get(&self, id: Uuid) -> Result<Task, TaskError>;
}

/// Fields a caller supplies to create a task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub description: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<TaskFile>,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn file(mut self, name: impl Into<String>, data: impl Into<String>) -> Self {
        self.files.push(TaskFile {
            name: name.into(),
            data: data.into(),
        });
        self
    }
}

/// In-memory task store with validated lifecycle transitions.
///
/// Tasks are kept in insertion order, which is the final tie-breaker when
/// picking the next ready task.
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Task>>, TaskError> {
        self.tasks.lock().map_err(|e| {
            TaskError::Storage(DeskpilotError::Storage(format!("Lock poisoned: {}", e)))
        })
    }

    /// Create a task. It starts in `ScheduledWait` when `scheduled_for` is
    /// set, otherwise in `Pending`.
    pub fn create(&self, new: NewTask) -> Result<Task, TaskError> {
        let status = if new.scheduled_for.is_some() {
            TaskStatus::ScheduledWait
        } else {
            TaskStatus::Pending
        };
        let task = Task {
            id: Uuid::new_v4(),
            description: new.description,
            status,
            priority: new.priority,
            scheduled_for: new.scheduled_for,
            queued_at: None,
            executed_at: None,
            completed_at: None,
            created_at: self.clock.now(),
            error: None,
            files: new.files,
        };

        self.lock()?.push(task.clone());
        debug!(task_id = %task.id, status = %task.status, priority = %task.priority, "Task created");
        Ok(task)
    }

    pub fn get_task(&self, id: Uuid) -> Result<Task, TaskError> {
        self.lock()?
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    /// List tasks, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<TaskStatus>, limit: Option<usize>) -> Vec<Task> {
        let tasks = match self.lock() {
            Ok(t) => t,
            Err(_) => return vec![],
        };

        let mut result: Vec<Task> = tasks
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();

        // Newest first
        result.reverse();

        if let Some(limit) = limit {
            result.truncate(limit);
        }

        result
    }

    /// Cancel a task that has not reached a terminal status.
    pub fn cancel(&self, id: Uuid) -> Result<Task, TaskError> {
        self.apply(id, TaskUpdate::to(TaskStatus::Cancelled))
    }

    fn apply(&self, id: Uuid, update: TaskUpdate) -> Result<Task, TaskError> {
        let now = self.clock.now();
        let mut tasks = self.lock()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TaskError::NotFound(id))?;

        if let Some(expected) = update.expected {
            if task.status != expected {
                return Err(TaskError::StatusConflict {
                    id,
                    expected,
                    actual: task.status,
                });
            }
        }

        validate_transition(task.status, update.status)?;

        debug!(task_id = %id, from = %task.status, to = %update.status, "Task status changed");
        task.status = update.status;
        if let Some(at) = update.queued_at {
            task.queued_at = Some(at);
        }
        if let Some(at) = update.executed_at {
            task.executed_at = Some(at);
        }
        if update.error.is_some() {
            task.error = update.error;
        }
        if update.status.is_terminal() {
            task.completed_at = Some(now);
        }

        Ok(task.clone())
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_due_scheduled_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, TaskError> {
        let mut due: Vec<Task> = self
            .lock()?
            .iter()
            .filter(|t| {
                t.status == TaskStatus::ScheduledWait
                    && t.scheduled_for.map_or(false, |at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|t| t.scheduled_for);
        Ok(due)
    }

    async fn find_next_ready_task(&self) -> Result<Option<Task>, TaskError> {
        let tasks = self.lock()?;
        Ok(tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status.is_ready())
            .min_by_key(|(index, t)| {
                (
                    Reverse(t.priority),
                    t.queued_at.unwrap_or(t.created_at),
                    *index,
                )
            })
            .map(|(_, t)| t.clone()))
    }

    async fn update_task_status(&self, id: Uuid, update: TaskUpdate) -> Result<Task, TaskError> {
        self.apply(id, update)
    }

    async fn get(&self, id: Uuid) -> Result<Task, TaskError> {
        self.get_task(id)
    }
}
