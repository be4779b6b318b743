//! The automation worker: the single consumer of the dispatch queue.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::ActionDispatchQueue;
use crate::executor::ActionExecutor;

/// Pulls jobs one at a time, runs them through an [`ActionExecutor`], and
/// reports each outcome back to the queue.
pub struct AutomationWorker {
    queue: Arc<ActionDispatchQueue>,
    executor: Arc<dyn ActionExecutor>,
}

impl AutomationWorker {
    pub fn new(queue: Arc<ActionDispatchQueue>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { queue, executor }
    }

    /// Run on a background task until the queue shuts down.
    pub fn spawn(self) -> JoinHandle<usize> {
        tokio::spawn(async move { self.run().await })
    }

    /// Process jobs until the queue shuts down. Returns the number of jobs
    /// executed.
    pub async fn run(&self) -> usize {
        info!("Automation worker started");
        let mut executed = 0;

        while let Some(job) = self.queue.next().await {
            let kind = job.action.kind();
            debug!(job_id = %job.id, action = %kind, "Executing action");

            match self.executor.execute(&job.action).await {
                Ok(data) => self.queue.complete_success(&job.id, data),
                Err(e) => {
                    warn!(job_id = %job.id, action = %kind, error = %e, "Action failed");
                    self.queue.complete_error(&job.id, &e);
                }
            }
            executed += 1;
        }

        info!(executed, "Automation worker stopped");
        executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ActionError, DispatchError};
    use crate::types::{ActionKind, ComputerAction};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the actions it sees; fails on `application`.
    #[derive(Default)]
    struct RecordingExecutor {
        seen: Mutex<Vec<ActionKind>>,
    }

    #[async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn execute(&self, action: &ComputerAction) -> Result<Value, ActionError> {
            self.seen.lock().unwrap().push(action.kind());
            match action {
                ComputerAction::Application { .. } => {
                    Err(ActionError::HandlerFailed("launcher missing".to_string()))
                }
                _ => Ok(json!({"done": action.kind().as_str()})),
            }
        }
    }

    #[tokio::test]
    async fn test_worker_executes_in_order_and_stops_on_shutdown() {
        let queue = Arc::new(ActionDispatchQueue::new());
        let executor = Arc::new(RecordingExecutor::default());
        let worker = AutomationWorker::new(queue.clone(), executor.clone()).spawn();

        let (_, first) = queue
            .enqueue(ComputerAction::Screenshot, Some("c1".to_string()), None)
            .unwrap();
        let (_, second) = queue
            .enqueue(ComputerAction::CursorPosition, Some("c1".to_string()), None)
            .unwrap();

        assert_eq!(first.wait().await.unwrap(), json!({"done": "screenshot"}));
        assert_eq!(
            second.wait().await.unwrap(),
            json!({"done": "cursor_position"})
        );

        queue.shutdown(None);
        let executed = tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(executed, 2);
        assert_eq!(
            *executor.seen.lock().unwrap(),
            vec![ActionKind::Screenshot, ActionKind::CursorPosition]
        );
    }

    #[tokio::test]
    async fn test_executor_failure_is_reported_as_execution_failed() {
        let queue = Arc::new(ActionDispatchQueue::new());
        let _worker =
            AutomationWorker::new(queue.clone(), Arc::new(RecordingExecutor::default())).spawn();

        let (_, handle) = queue
            .enqueue(
                ComputerAction::Application {
                    application: "firefox".to_string(),
                },
                Some("c1".to_string()),
                None,
            )
            .unwrap();

        match handle.wait().await {
            Err(DispatchError::ExecutionFailed { message, .. }) => {
                assert_eq!(message, "Action handler failed: launcher missing");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        queue.shutdown(None);
    }
}
