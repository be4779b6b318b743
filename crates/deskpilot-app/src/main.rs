//! Deskpilot daemon binary - composition root.
//!
//! Ties the Deskpilot crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the dispatch queue and the in-memory task store
//! 3. Start the automation worker on a headless desktop
//! 4. Start the task scheduler with a scripted task processor
//! 5. Serve the HTTP/WebSocket API until Ctrl-C, then shut everything down

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use deskpilot_action::{
    ActionDispatchQueue, AgentProcessor, AutomationWorker, HeadlessDesktop, InMemoryTaskStore,
    QueueFileWriter, ScriptedRunner, TaskScheduler,
};
use deskpilot_api::routes;
use deskpilot_api::state::AppState;
use deskpilot_core::clock::SystemClock;
use deskpilot_core::config::DeskpilotConfig;

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = if config_file.exists() {
        Some(DeskpilotConfig::load(&config_file))
    } else {
        None
    };
    let mut config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => DeskpilotConfig::default(),
    };

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Deskpilot v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Some(Ok(_)) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(Err(e)) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::info!(path = %config_file.display(), "No config file, using defaults"),
    }

    args.apply_overrides(&mut config);
    if config.disable_scheduler_without_worker() {
        tracing::warn!("Automation worker disabled, so the task scheduler is disabled too");
    }

    if args.init_config {
        config.save(&config_file)?;
        return Ok(());
    }

    // === Core components ===

    let queue = Arc::new(ActionDispatchQueue::new());
    let tasks = Arc::new(InMemoryTaskStore::new());

    // Automation worker.
    let worker = if config.dispatch.worker_enabled {
        let desktop = HeadlessDesktop::from_config(&config.desktop);
        if let Err(e) = std::fs::create_dir_all(desktop.root()) {
            tracing::error!(path = %desktop.root().display(), error = %e, "Failed to create desktop root");
            return Err(e.into());
        }
        tracing::info!(root = %desktop.root().display(), "Automation worker on headless desktop");
        Some(AutomationWorker::new(Arc::clone(&queue), Arc::new(desktop)).spawn())
    } else {
        tracing::info!("Automation worker disabled");
        None
    };

    // Task scheduler.
    let scheduler = if config.scheduler.enabled {
        let runner = Arc::new(ScriptedRunner::new(Arc::clone(&queue)));
        let processor = Arc::new(AgentProcessor::new(tasks.clone(), runner));
        let scheduler = Arc::new(TaskScheduler::new(
            tasks.clone(),
            processor,
            Arc::new(QueueFileWriter::new(Arc::clone(&queue))),
            Arc::new(SystemClock),
            config.scheduler.clone(),
        ));
        let looping = Arc::clone(&scheduler);
        tokio::spawn(async move { looping.run().await });
        Some(scheduler)
    } else {
        tracing::info!("Task scheduler disabled");
        None
    };

    // === API server ===

    let state = AppState::new(config.clone(), Arc::clone(&queue), Arc::clone(&tasks));

    let shutdown = {
        let queue = Arc::clone(&queue);
        let scheduler = scheduler.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            if let Some(scheduler) = scheduler {
                scheduler.shutdown();
            }
            // Releases the worker and every client still waiting on a result.
            queue.shutdown(Some("server shutting down"));
        }
    };

    if let Err(e) = routes::start_server(&config.general, state, shutdown).await {
        tracing::error!(error = %e, "API server failed");
        tracing::error!(
            "Is another instance running? Try: DESKPILOT_PORT={} deskpilot",
            config.general.port.saturating_add(1)
        );
        queue.shutdown(Some("server failed"));
        return Err(e.into());
    }

    if let Some(worker) = worker {
        match tokio::time::timeout(Duration::from_secs(5), worker).await {
            Ok(Ok(executed)) => tracing::info!(executed, "Automation worker finished"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Automation worker panicked"),
            Err(_) => tracing::warn!("Automation worker did not stop in time"),
        }
    }

    tracing::info!("Deskpilot stopped");
    Ok(())
}
