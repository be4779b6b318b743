//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, and all endpoint
//! handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use deskpilot_core::config::GeneralConfig;
use deskpilot_core::error::DeskpilotError;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Allow the local dashboard on the configured port.
    let port = state.config.general.port;
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/tasks/{id}", get(handlers::get_task))
        .route("/tasks/{id}/cancel", post(handlers::cancel_task))
        .route("/actions", post(handlers::submit_action))
        .route("/actions/ws", get(ws::actions_ws))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024)) // task attachments travel inline
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `general.host:general.port` until `shutdown` resolves.
pub async fn start_server<F>(
    config: &GeneralConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), DeskpilotError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeskpilotError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}
