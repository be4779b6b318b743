//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use deskpilot_action::{ActionDispatchQueue, ActionGateway, InMemoryTaskStore};
use deskpilot_core::config::DeskpilotConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the life of the server.
    pub config: Arc<DeskpilotConfig>,
    /// The dispatch queue behind the gateway, for introspection.
    pub queue: Arc<ActionDispatchQueue>,
    /// Opens one connection per client.
    pub gateway: ActionGateway,
    /// Task store shared with the scheduler.
    pub tasks: Arc<InMemoryTaskStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: DeskpilotConfig,
        queue: Arc<ActionDispatchQueue>,
        tasks: Arc<InMemoryTaskStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            gateway: ActionGateway::new(Arc::clone(&queue)),
            queue,
            tasks,
            start_time: Instant::now(),
        }
    }
}
