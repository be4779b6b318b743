//! Route handler functions for the HTTP endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use deskpilot_action::task::NewTask;
use deskpilot_action::{ActionRequest, ActionResponse, Task, TaskStatus};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TaskListParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Actions waiting for the automation worker.
    pub queue_depth: usize,
    /// Actions whose result has not been delivered yet.
    pub pending_results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.queue.is_closed() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        queue_depth: state.queue.depth(),
        pending_results: state.queue.pending_count(),
    })
}

// =============================================================================
// Tasks
// =============================================================================

/// GET /tasks - list tasks, newest first.
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskListParams>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let tasks = state.tasks.list(status, Some(params.limit.unwrap_or(50).min(500)));
    Ok(Json(TaskListResponse { tasks }))
}

/// POST /tasks - create a task.
///
/// A task with `scheduled_for` waits until that time before it is queued.
pub async fn create_task(
    State(state): State<AppState>,
    Json(new): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if new.description.trim().is_empty() {
        return Err(ApiError::UnprocessableEntity(
            "Task description must not be empty".to_string(),
        ));
    }
    for file in &new.files {
        if file.name.is_empty()
            || file.name.contains('/')
            || file.name.contains('\\')
            || file.name == ".."
        {
            return Err(ApiError::BadRequest(format!(
                "Invalid attachment name: {:?}",
                file.name
            )));
        }
    }

    let task = state.tasks.create(new)?;
    tracing::info!(task_id = %task.id, status = %task.status, "Task created via API");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks/{id} - fetch one task.
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.tasks.get_task(id)?))
}

/// POST /tasks/{id}/cancel - cancel a task that has not finished.
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = state.tasks.cancel(id)?;
    tracing::info!(task_id = %id, "Task cancelled via API");
    Ok(Json(task))
}

// =============================================================================
// Actions
// =============================================================================

/// POST /actions - run one action on a short-lived connection.
///
/// Waits for the result. If the client goes away first, the connection is
/// dropped with the request and its job is cancelled. Execution failures
/// come back as a 200 with `status: "error"`; rejected requests map to an
/// HTTP error.
pub async fn submit_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let (connection, _responses) = state.gateway.connect();
    let handle = connection.enqueue(request)?;
    let response = handle.into_response().await;
    drop(connection);
    Ok(Json(response))
}
