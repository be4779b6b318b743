//! Single-consumer FIFO dispatch of action jobs.
//!
//! Producers (client connections) call [`ActionDispatchQueue::enqueue`] and
//! hold a [`ResultHandle`]; the automation worker pulls jobs with
//! [`ActionDispatchQueue::next`] and reports back with `complete_*`.
//!
//! All state lives behind one mutex that is never held across an `.await`.
//! A consumer that finds the queue empty registers a one-shot waiter under
//! the same lock an enqueue uses to look for waiters, so a wake-up cannot be
//! lost. Waiters and ready jobs are never both non-empty.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job::{ActionResult, Job, ResultHandle};
use crate::error::DispatchError;
use crate::types::ComputerAction;

/// The unresolved continuation for one outstanding job.
struct PendingResult {
    origin_id: Option<String>,
    responder: oneshot::Sender<ActionResult>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Job>,
    pending: HashMap<String, PendingResult>,
    /// Suspended consumers, oldest first. Dropping a sender releases its
    /// consumer with `None`.
    waiters: VecDeque<oneshot::Sender<Job>>,
    closed: bool,
}

impl QueueState {
    /// Hand `job` to the oldest live waiter, or park it in the ready queue.
    fn deliver(&mut self, mut job: Job, at_front: bool) {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(job) {
                Ok(()) => return,
                // That consumer gave up on its pull; try the next one.
                Err(returned) => job = returned,
            }
        }
        if at_front {
            self.ready.push_front(job);
        } else {
            self.ready.push_back(job);
        }
    }
}

/// FIFO queue of pending action jobs with result correlation and
/// per-connection cancellation.
#[derive(Default)]
pub struct ActionDispatchQueue {
    state: Mutex<QueueState>,
}

impl ActionDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // No invariant spans a panic point inside the critical sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new job.
    ///
    /// Uses `request_id` as the job id when given, otherwise generates one.
    /// Fails without touching any state if the queue is closed or the id is
    /// already outstanding.
    pub fn enqueue(
        &self,
        action: ComputerAction,
        origin_id: Option<String>,
        request_id: Option<String>,
    ) -> Result<(String, ResultHandle), DispatchError> {
        let kind = action.kind();
        let mut state = self.lock();

        if state.closed {
            return Err(DispatchError::QueueClosed);
        }

        let id = match request_id {
            Some(id) if state.pending.contains_key(&id) => {
                return Err(DispatchError::DuplicateRequest(id));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let (tx, rx) = oneshot::channel();
        state.pending.insert(
            id.clone(),
            PendingResult {
                origin_id: origin_id.clone(),
                responder: tx,
            },
        );
        state.deliver(
            Job {
                id: id.clone(),
                action,
                origin_id,
            },
            false,
        );

        debug!(job_id = %id, action = %kind, depth = state.ready.len(), "Action enqueued");
        Ok((id.clone(), ResultHandle::new(id, kind, rx)))
    }

    /// Pull the next job, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue has shut down. Dropping the returned
    /// future before it resolves never loses a job.
    pub async fn next(&self) -> Option<Job> {
        let rx = {
            let mut state = self.lock();
            if let Some(job) = state.ready.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut guard = WaiterGuard {
            queue: self,
            rx: Some(rx),
        };
        let job = match guard.rx.as_mut() {
            Some(rx) => rx.await.ok(),
            None => None,
        };
        guard.rx = None;
        job
    }

    /// Put back a job whose consumer vanished between hand-off and receipt.
    fn requeue_front(&self, job: Job) {
        let mut state = self.lock();
        if state.closed || !state.pending.contains_key(&job.id) {
            return;
        }
        debug!(job_id = %job.id, "Requeued job from an abandoned pull");
        state.deliver(job, true);
    }

    /// Resolve a job successfully. Unknown ids are ignored.
    pub fn complete_success(&self, id: &str, data: serde_json::Value) {
        self.resolve(id, Ok(data));
    }

    /// Resolve a job with an execution failure. Unknown ids are ignored.
    pub fn complete_error<E>(&self, id: &str, error: &E)
    where
        E: std::error::Error + ?Sized,
    {
        self.resolve(
            id,
            Err(DispatchError::ExecutionFailed {
                message: error.to_string(),
                detail: Some(format!("{:?}", error)),
            }),
        );
    }

    fn resolve(&self, id: &str, result: ActionResult) {
        let pending = self.lock().pending.remove(id);
        match pending {
            Some(p) => {
                if p.responder.send(result).is_err() {
                    debug!(job_id = %id, "Result dropped, requester went away");
                }
            }
            None => warn!(job_id = %id, "Completion for unknown or cancelled job ignored"),
        }
    }

    /// Fail every queued job and outstanding result that belongs to
    /// `origin_id`. Returns how many results were cancelled.
    ///
    /// Once this returns, no completion can reach those jobs anymore.
    pub fn clear_connection(&self, origin_id: &str) -> usize {
        let cancelled: Vec<PendingResult> = {
            let mut state = self.lock();
            state
                .ready
                .retain(|job| job.origin_id.as_deref() != Some(origin_id));
            let ids: Vec<String> = state
                .pending
                .iter()
                .filter(|(_, p)| p.origin_id.as_deref() == Some(origin_id))
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter()
                .filter_map(|id| state.pending.remove(id))
                .collect()
        };

        let count = cancelled.len();
        for pending in cancelled {
            let _ = pending
                .responder
                .send(Err(DispatchError::ConnectionClosed(origin_id.to_string())));
        }
        if count > 0 {
            info!(origin = %origin_id, cancelled = count, "Cleared connection jobs");
        }
        count
    }

    /// Close the queue for good.
    ///
    /// Releases every waiting consumer with `None`, fails every outstanding
    /// result with `ShuttingDown`, and drops queued jobs. Later calls are no-ops.
    pub fn shutdown(&self, reason: Option<&str>) {
        let reason = reason.unwrap_or("shutdown requested").to_string();
        let pending: Vec<PendingResult> = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.waiters.clear();
            state.ready.clear();
            state.pending.drain().map(|(_, p)| p).collect()
        };

        info!(reason = %reason, failed = pending.len(), "Dispatch queue shut down");
        for p in pending {
            let _ = p
                .responder
                .send(Err(DispatchError::ShuttingDown(reason.clone())));
        }
    }

    /// Jobs waiting to be pulled.
    pub fn depth(&self) -> usize {
        self.lock().ready.len()
    }

    /// Jobs whose result has not been delivered yet (queued or in flight).
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Returns a job to the queue if the pull that received it is dropped
/// before reading it.
struct WaiterGuard<'a> {
    queue: &'a ActionDispatchQueue,
    rx: Option<oneshot::Receiver<Job>>,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if let Ok(job) = rx.try_recv() {
                self.queue.requeue_front(job);
            }
        }
    }
}
