//! Task processing.
//!
//! The scheduler hands a running task to a [`TaskProcessor`] and moves on.
//! [`AgentProcessor`] runs one task at a time through a [`TaskRunner`] and
//! records how it ended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatch::ActionDispatchQueue;
use crate::task::TaskStore;
use crate::types::{ComputerAction, Task, TaskStatus, TaskUpdate};

/// Executes tasks handed over by the scheduler.
pub trait TaskProcessor: Send + Sync {
    /// Whether a task is still executing.
    fn is_running(&self) -> bool;

    /// Start executing a task that is already marked `Running`. Returns
    /// without waiting for it to finish.
    fn process_task(&self, id: Uuid);
}

/// How a task run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed(String),
    NeedsHelp,
    NeedsReview,
}

impl TaskOutcome {
    fn into_update(self) -> TaskUpdate {
        let update = match self {
            TaskOutcome::Completed => TaskUpdate::to(TaskStatus::Completed),
            TaskOutcome::Failed(reason) => TaskUpdate::to(TaskStatus::Failed).with_error(reason),
            TaskOutcome::NeedsHelp => TaskUpdate::to(TaskStatus::NeedsHelp),
            TaskOutcome::NeedsReview => TaskUpdate::to(TaskStatus::NeedsReview),
        };
        update.expecting(TaskStatus::Running)
    }
}

/// Does the actual work of a task.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &Task) -> TaskOutcome;
}

/// Runs a single task at a time on a background tokio task.
pub struct AgentProcessor {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TaskRunner>,
    running: Arc<AtomicBool>,
}

impl AgentProcessor {
    pub fn new(store: Arc<dyn TaskStore>, runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            store,
            runner,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl TaskProcessor for AgentProcessor {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn process_task(&self, id: Uuid) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(task_id = %id, "Processor busy, task not started");
            return;
        }

        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            match store.get(id).await {
                Ok(task) => {
                    info!(task_id = %id, "Task started");
                    let outcome = runner.run(&task).await;
                    info!(task_id = %id, outcome = ?outcome, "Task finished");
                    if let Err(e) = store.update_task_status(id, outcome.into_update()).await {
                        // Usually a cancellation that raced the run.
                        warn!(task_id = %id, error = %e, "Could not record task outcome");
                    }
                }
                Err(e) => error!(task_id = %id, error = %e, "Task vanished before it ran"),
            }
            running.store(false, Ordering::SeqCst);
        });
    }
}

/// Runs tasks whose description is a JSON array of computer actions,
/// dispatching each through the queue in order.
///
/// Any other description is left for a human.
pub struct ScriptedRunner {
    queue: Arc<ActionDispatchQueue>,
}

impl ScriptedRunner {
    pub fn new(queue: Arc<ActionDispatchQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn run(&self, task: &Task) -> TaskOutcome {
        let script: Vec<ComputerAction> = match serde_json::from_str(&task.description) {
            Ok(script) => script,
            Err(_) => return TaskOutcome::NeedsHelp,
        };

        let origin = format!("task-{}", task.id);
        for (step, action) in script.into_iter().enumerate() {
            let kind = action.kind();
            let handle = match self.queue.enqueue(action, Some(origin.clone()), None) {
                Ok((_, handle)) => handle,
                Err(e) => return TaskOutcome::Failed(format!("step {} ({}): {}", step, kind, e)),
            };
            if let Err(e) = handle.wait().await {
                return TaskOutcome::Failed(format!("step {} ({}): {}", step, kind, e));
            }
        }
        TaskOutcome::Completed
    }
}
