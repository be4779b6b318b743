//! Jobs and result handles.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::types::{ActionKind, ActionResponse, ComputerAction};

/// What a finished job resolves to.
pub type ActionResult = Result<serde_json::Value, DispatchError>;

/// One queued action awaiting execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: String,
    pub action: ComputerAction,
    pub origin_id: Option<String>,
}

/// The requester's side of a job: resolves once the job succeeds, fails,
/// is cancelled with its connection, or the queue shuts down.
#[derive(Debug)]
pub struct ResultHandle {
    id: String,
    kind: ActionKind,
    rx: oneshot::Receiver<ActionResult>,
}

impl ResultHandle {
    pub(crate) fn new(id: String, kind: ActionKind, rx: oneshot::Receiver<ActionResult>) -> Self {
        Self { id, kind, rx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Wait for the result. There is no timeout.
    pub async fn wait(self) -> ActionResult {
        // The responder is only dropped unsent if the queue itself is gone.
        self.rx.await.unwrap_or(Err(DispatchError::QueueClosed))
    }

    /// Wait for the result and shape it as a client response.
    pub async fn into_response(self) -> ActionResponse {
        let id = self.id.clone();
        let kind = self.kind;
        match self.wait().await {
            Ok(data) => ActionResponse::ok(id, kind, data),
            Err(e) => ActionResponse::error(id, kind, e.to_response_error()),
        }
    }
}
