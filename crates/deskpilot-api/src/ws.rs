//! WebSocket action gateway.
//!
//! Each socket is one gateway connection. Text frames carry an
//! `ActionRequest` in and an `ActionResponse` out, in completion order.
//! Closing the socket cancels whatever the connection still has pending.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::{debug, info};

use deskpilot_action::{ActionRequest, Connection};

use crate::error::ErrorBody;
use crate::state::AppState;

/// GET /actions/ws - upgrade to a WebSocket action connection.
pub async fn actions_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (connection, mut responses) = state.gateway.connect();
    info!(origin = %connection.origin_id(), "WebSocket connection opened");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                let text = match inbound {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                if let Some(reply) = handle_text(&connection, text.as_str()) {
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
            Some(response) = responses.recv() => {
                let payload = match serde_json::to_string(&response) {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(error = %e, "Could not encode response");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(origin = %connection.origin_id(), "WebSocket connection closed");
}

/// Submit one inbound frame. Returns a reply to send right away when the
/// frame is not a valid request; everything else is answered through the
/// connection's response channel.
pub(crate) fn handle_text(connection: &Connection, text: &str) -> Option<String> {
    match serde_json::from_str::<ActionRequest>(text) {
        Ok(request) => {
            // Rejections are already relayed as error responses.
            let _ = connection.submit(request);
            None
        }
        Err(e) => {
            debug!(origin = %connection.origin_id(), error = %e, "Malformed action request");
            let body = ErrorBody {
                error: "bad_request".to_string(),
                message: format!("Invalid action request: {}", e),
                details: None,
            };
            serde_json::to_string(&body).ok()
        }
    }
}
