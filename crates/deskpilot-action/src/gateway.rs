//! Connection-facing side of the dispatch queue.
//!
//! Each client connection gets a [`Connection`] with its own origin id.
//! Results are relayed to the connection's outbound channel as they
//! resolve; dropping the connection cancels everything it still has queued
//! or in flight.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::{ActionDispatchQueue, ResultHandle};
use crate::error::DispatchError;
use crate::types::{ActionRequest, ActionResponse};

/// Hands out connections bound to one dispatch queue.
#[derive(Clone)]
pub struct ActionGateway {
    queue: Arc<ActionDispatchQueue>,
}

impl ActionGateway {
    pub fn new(queue: Arc<ActionDispatchQueue>) -> Self {
        Self { queue }
    }

    /// Open a connection. Responses for its requests arrive on the returned
    /// receiver in completion order.
    pub fn connect(&self) -> (Connection, mpsc::UnboundedReceiver<ActionResponse>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let origin_id = Uuid::new_v4().to_string();
        debug!(origin = %origin_id, "Connection opened");
        (
            Connection {
                origin_id,
                queue: Arc::clone(&self.queue),
                outbound,
            },
            rx,
        )
    }
}

/// One client connection. Dropping it clears its jobs from the queue.
pub struct Connection {
    origin_id: String,
    queue: Arc<ActionDispatchQueue>,
    outbound: mpsc::UnboundedSender<ActionResponse>,
}

impl Connection {
    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// Enqueue a request without waiting for its result.
    pub fn enqueue(&self, request: ActionRequest) -> Result<ResultHandle, DispatchError> {
        self.queue
            .enqueue(request.action, Some(self.origin_id.clone()), request.request_id)
            .map(|(_, handle)| handle)
    }

    /// Enqueue a request and relay its result to the outbound channel when
    /// it resolves. A rejected request is answered immediately with an
    /// error response and the error is also returned.
    pub fn submit(&self, request: ActionRequest) -> Result<String, DispatchError> {
        let kind = request.action.kind();
        let fallback_id = request.request_id.clone().unwrap_or_default();

        match self.enqueue(request) {
            Ok(handle) => {
                let id = handle.id().to_string();
                let outbound = self.outbound.clone();
                tokio::spawn(async move {
                    let response = handle.into_response().await;
                    if outbound.send(response).is_err() {
                        debug!("Response dropped, connection receiver gone");
                    }
                });
                Ok(id)
            }
            Err(e) => {
                warn!(origin = %self.origin_id, code = e.code(), error = %e, "Action rejected");
                let _ = self.outbound.send(ActionResponse::error(
                    fallback_id,
                    kind,
                    e.to_response_error(),
                ));
                Err(e)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let cancelled = self.queue.clear_connection(&self.origin_id);
        debug!(origin = %self.origin_id, cancelled, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionKind, ComputerAction, Coordinates, MouseButton};
    use serde_json::json;
    use std::time::Duration;

    fn request(id: &str, action: ComputerAction) -> ActionRequest {
        ActionRequest {
            request_id: Some(id.to_string()),
            action,
        }
    }

    #[tokio::test]
    async fn test_submitted_result_is_relayed() {
        let queue = Arc::new(ActionDispatchQueue::new());
        let gateway = ActionGateway::new(queue.clone());
        let (conn, mut responses) = gateway.connect();

        let id = conn
            .submit(request(
                "a1",
                ComputerAction::ClickMouse {
                    coordinates: Some(Coordinates::new(10, 20)),
                    button: MouseButton::Left,
                    click_count: 1,
                    hold_keys: vec![],
                },
            ))
            .unwrap();
        assert_eq!(id, "a1");

        let job = queue.next().await.unwrap();
        assert_eq!(job.origin_id.as_deref(), Some(conn.origin_id()));
        queue.complete_success(&job.id, json!({"x": 10, "y": 20}));

        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            response,
            ActionResponse::ok("a1", ActionKind::ClickMouse, json!({"x": 10, "y": 20}))
        );
    }

    #[tokio::test]
    async fn test_duplicate_is_answered_with_error_response() {
        let queue = Arc::new(ActionDispatchQueue::new());
        let gateway = ActionGateway::new(queue.clone());
        let (conn, mut responses) = gateway.connect();

        conn.submit(request("dup", ComputerAction::Screenshot)).unwrap();
        let err = conn
            .submit(request("dup", ComputerAction::Screenshot))
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_request");

        let response = responses.recv().await.unwrap();
        assert_eq!(response.id, "dup");
        assert!(!response.is_ok());
        assert_eq!(response.error.unwrap().code, "duplicate_request");
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_dropping_connection_cancels_its_jobs_only() {
        let queue = Arc::new(ActionDispatchQueue::new());
        let gateway = ActionGateway::new(queue.clone());
        let (gone, _gone_rx) = gateway.connect();
        let (stays, _stays_rx) = gateway.connect();

        let handle = gone.enqueue(request("x", ComputerAction::Screenshot)).unwrap();
        stays
            .submit(request("y", ComputerAction::CursorPosition))
            .unwrap();

        drop(gone);

        assert!(matches!(
            handle.wait().await,
            Err(DispatchError::ConnectionClosed(_))
        ));
        assert_eq!(queue.depth(), 1);
        assert_eq!(queue.next().await.unwrap().id, "y");
    }
}
