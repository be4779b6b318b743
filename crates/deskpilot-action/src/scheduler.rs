//! Task scheduler.
//!
//! On every tick: promote due scheduled tasks, then, if the processor is
//! idle, start the highest-priority ready task after materializing its
//! attached files on the desktop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deskpilot_core::clock::Clock;
use deskpilot_core::config::SchedulerConfig;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::ActionDispatchQueue;
use crate::error::SchedulerError;
use crate::processor::TaskProcessor;
use crate::task::TaskStore;
use crate::types::{ComputerAction, Task, TaskStatus, TaskUpdate};

/// Origin id used for actions the scheduler dispatches itself.
pub const SCHEDULER_ORIGIN: &str = "scheduler";

/// A file to place on the desktop before a task runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileUpload {
    /// Desktop-relative destination path.
    pub path: String,
    /// Base64 content.
    pub content: String,
}

/// Writes task attachments to the desktop.
#[async_trait]
pub trait FileWriter: Send + Sync {
    async fn write_file(&self, upload: FileUpload) -> Result<(), SchedulerError>;
}

/// Writes files by dispatching `write_file` actions through the dispatch
/// queue and waiting for the automation worker to finish each one.
pub struct QueueFileWriter {
    queue: Arc<ActionDispatchQueue>,
}

impl QueueFileWriter {
    pub fn new(queue: Arc<ActionDispatchQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl FileWriter for QueueFileWriter {
    async fn write_file(&self, upload: FileUpload) -> Result<(), SchedulerError> {
        let failed = |reason: String| SchedulerError::FileWriteFailed {
            path: upload.path.clone(),
            reason,
        };
        let action = ComputerAction::WriteFile {
            path: upload.path.clone(),
            data: upload.content.clone(),
        };
        let (_, handle) = self
            .queue
            .enqueue(action, Some(SCHEDULER_ORIGIN.to_string()), None)
            .map_err(|e| failed(e.to_string()))?;
        handle.wait().await.map_err(|e| failed(e.to_string()))?;
        Ok(())
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Scheduled tasks moved to `Queued`.
    pub promoted: usize,
    /// The task started on this tick, if any.
    pub dispatched: Option<Uuid>,
    /// The processor was still busy, so nothing was started.
    pub busy: bool,
}

/// Periodic admission loop that starts at most one task at a time.
pub struct TaskScheduler {
    store: Arc<dyn TaskStore>,
    processor: Arc<dyn TaskProcessor>,
    files: Arc<dyn FileWriter>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    shutdown: Arc<Notify>,
}

impl TaskScheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        processor: Arc<dyn TaskProcessor>,
        files: Arc<dyn FileWriter>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            processor,
            files,
            clock,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Tick on a fixed interval until [`shutdown`](Self::shutdown) is called.
    /// The first tick runs immediately.
    pub async fn run(&self) {
        let period = Duration::from_secs(self.config.tick_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "Task scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    debug!(
                        promoted = report.promoted,
                        dispatched = ?report.dispatched,
                        busy = report.busy,
                        "Scheduler tick"
                    );
                }
                _ = self.shutdown.notified() => {
                    info!("Task scheduler stopped");
                    return;
                }
            }
        }
    }

    /// Signal the scheduler loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run one scheduling pass. Errors are logged, never propagated.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport {
            promoted: self.promote_due(self.clock.now()).await,
            ..Default::default()
        };

        if self.processor.is_running() {
            report.busy = true;
            return report;
        }

        match self.dispatch_next().await {
            Ok(dispatched) => report.dispatched = dispatched,
            Err(e) => error!(error = %e, "Task dispatch failed"),
        }
        report
    }

    async fn promote_due(&self, now: DateTime<Utc>) -> usize {
        let due = match self.store.find_due_scheduled_tasks(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Could not load scheduled tasks");
                return 0;
            }
        };

        let mut promoted = 0;
        for task in due {
            let update = TaskUpdate::to(TaskStatus::Queued)
                .expecting(TaskStatus::ScheduledWait)
                .queued_at(now);
            match self.store.update_task_status(task.id, update).await {
                Ok(_) => {
                    info!(task_id = %task.id, "Scheduled task queued");
                    promoted += 1;
                }
                Err(e) => warn!(task_id = %task.id, error = %e, "Could not queue scheduled task"),
            }
        }
        promoted
    }

    async fn dispatch_next(&self) -> Result<Option<Uuid>, SchedulerError> {
        let Some(task) = self.store.find_next_ready_task().await? else {
            return Ok(None);
        };

        self.upload_files(&task).await?;

        let update = TaskUpdate::to(TaskStatus::Running)
            .expecting(task.status)
            .executed_at(self.clock.now());
        self.store.update_task_status(task.id, update).await?;

        info!(task_id = %task.id, priority = %task.priority, "Task dispatched");
        self.processor.process_task(task.id);
        Ok(Some(task.id))
    }

    async fn upload_files(&self, task: &Task) -> Result<(), SchedulerError> {
        let dir = self.config.upload_dir.trim_end_matches('/');
        for file in &task.files {
            let path = if dir.is_empty() {
                file.name.clone()
            } else {
                format!("{}/{}", dir, file.name)
            };
            debug!(task_id = %task.id, path = %path, "Uploading task file");
            self.files
                .write_file(FileUpload {
                    path,
                    content: file.data.clone(),
                })
                .await?;
        }
        Ok(())
    }
}
