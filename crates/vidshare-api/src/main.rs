//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vidshare_api::{create_router, ApiConfig, AppState};
use vidshare_media::FfmpegEncoder;
use vidshare_scheduler::{SchedulerConfig, TranscodeScheduler};
use vidshare_storage::MediaStore;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vidshare=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vidshare-api");

    // Load configuration
    let api_config = ApiConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();
    info!(
        "API config: host={}, port={}, pool={}",
        api_config.host, api_config.port, scheduler_config.max_concurrent_encodes
    );

    if let Err(e) = vidshare_media::check_ffmpeg() {
        error!("FFmpeg preflight failed: {e}");
        std::process::exit(1);
    }

    // Prepare storage
    let store = MediaStore::from_env();
    if let Err(e) = store.init().await {
        error!("Failed to prepare storage directories: {e}");
        std::process::exit(1);
    }

    // Wire the encoder with timeout and a cancellation channel flipped
    // on shutdown, then the scheduler owning the worker pool.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let encoder = FfmpegEncoder::new()
        .with_timeout(scheduler_config.encode_timeout)
        .with_cancel(cancel_rx);
    let scheduler = Arc::new(TranscodeScheduler::new(
        scheduler_config,
        Arc::new(encoder),
        store.clone(),
    ));

    // Create router
    let state = AppState::new(api_config.clone(), store, Arc::clone(&scheduler));
    let app = create_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", api_config.host, api_config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Stop in-flight encodes and drain the pool.
    let _ = cancel_tx.send(true);
    scheduler.shutdown().await;

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
