//! Deskpilot API crate - axum HTTP server and WebSocket action gateway.
//!
//! Hosts the action gateway for network clients (one-shot HTTP requests
//! and long-lived WebSocket connections) alongside a small task surface
//! and a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
