//! ClubApp - club membership client
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! The binary initializes:
//! - Configuration ([`ConfigManager`], `ClubApp Data/ClubApp Config.yaml` plus
//!   `CLUBAPP__*` environment overrides)
//! - Logging infrastructure (daily file rotation, stderr console output in debug mode)
//! - The backend: [`SupabaseClient`] when a URL and anon key are configured,
//!   otherwise the seeded [`InMemoryBackend`] demo
//! - The [`AppController`] on a single-threaded tokio runtime
//!
//! Input is read line by line from stdin on a background thread and fed to
//! the controller through the [`EventLoopBridge`]. Type `help` for commands.

use anyhow::{Context, Result};
use clubapp::ui::{AppController, Collaborators, EventLoopBridge};
use clubapp::{
    APP_NAME, ConfigManager, DataService, IdentityService, InMemoryBackend, LocalStore, Metrics,
    StateManager, SupabaseClient, SystemClock, VERSION,
};
use std::sync::Arc;

type Backend = (Arc<dyn IdentityService>, Arc<dyn DataService>);

fn select_backend(config: &clubapp::AppConfig) -> Result<Backend> {
    if config.backend.is_configured() {
        let client = Arc::new(
            SupabaseClient::new(&config.backend).context("Failed to create backend client")?,
        );
        tracing::info!("Using backend at {}", config.backend.url);
        let identity: Arc<dyn IdentityService> = client.clone();
        let data: Arc<dyn DataService> = client;
        Ok((identity, data))
    } else {
        tracing::warn!("No backend configured, running against the in-memory demo backend");
        let demo = Arc::new(InMemoryBackend::with_demo_data());
        let identity: Arc<dyn IdentityService> = demo.clone();
        let data: Arc<dyn DataService> = demo;
        Ok((identity, data))
    }
}

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("ClubApp Data")?;
    let config = config_manager.load_settings()?;

    // Held until exit so buffered log lines are flushed
    let _log_guard = clubapp::logging::setup_logging_with_console(
        &config.app.log_dir,
        clubapp::logging::LOG_PREFIX,
        config.app.debug_mode,
        config.app.debug_mode,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    // One thread: events are handled strictly one at a time
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let cache_path = config_manager.cache_path(&config);
    let cache = match LocalStore::open(&cache_path) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!("Cache unavailable ({:#}), continuing without it", e);
            LocalStore::ephemeral()
        }
    };

    let (identity, data) = select_backend(&config)?;
    let metrics = Arc::new(Metrics::new());
    let collaborators = Collaborators {
        identity,
        data,
        cache: Arc::new(cache),
        clock: Arc::new(SystemClock),
    };

    let controller = AppController::new(StateManager::new(), collaborators, metrics.clone());

    let (bridge, events) = EventLoopBridge::new(metrics.clone());
    let _reader = bridge.spawn_reader(std::io::BufReader::new(std::io::stdin()));
    // The reader thread keeps its own handle; dropping ours lets the loop end on EOF
    drop(bridge);

    println!("{} v{} - type 'help' for commands", APP_NAME, VERSION);
    let result = runtime.block_on(controller.run(events));

    metrics.log_summary();
    tracing::info!("Application shutdown complete");

    result
}
