//! Countertop - shop-floor countdown timers and back-office automation
//!
//! This is the main entry point for the countertop server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countertop::{
    api::create_router,
    config::Config,
    state::{AppState, TimerPool},
    tasks::monthly_expenses_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countertop={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countertop server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, timers={}, sound={}",
        config.host, config.port, config.timers, config.default_sound
    );

    let sounds = config.sound_library();
    match sounds.dir() {
        Some(dir) => info!("Alarm clips from {}", dir.display()),
        None => info!("No sound directory configured, alarms are played by clients"),
    }

    let pool =
        TimerPool::initialize(config.timers, Arc::new(sounds.clone()), &config.default_sound)?;

    let gateway = config.gateway()?;
    if gateway.is_none() {
        tracing::warn!("DATABASE_URL not set, database endpoints will answer 503");
    }

    let state = Arc::new(AppState::new(
        pool,
        sounds,
        gateway,
        config.port,
        config.host.clone(),
    ));

    // Start the recurring expense trigger
    if let Some(every) = config.expenses_period() {
        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            monthly_expenses_task(task_state, every).await;
        });
    }

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET   /timers                  - All timers and active count");
    info!("  GET   /timers/events           - Timer updates (server-sent events)");
    info!("  PATCH /timers/:index           - Partial timer update");
    info!("  POST  /timers/:index/start     - Start a countdown");
    info!("  POST  /timers/silence          - Silence every alarm");
    info!("  POST  /tasks/monthly-expenses  - Run recurring expenses");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
