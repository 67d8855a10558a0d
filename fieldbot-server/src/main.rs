// Fieldbot server: camera, detector, controller and the operator websocket

use anyhow::Context;
use clap::Parser;
use fieldbot_eye::VisionError;
use fieldbot_server::settings::LoggingConfig;
use fieldbot_server::{create_router, metrics, AppState, Cli, FieldbotConfig};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = FieldbotConfig::load(&cli).context("Failed to load configuration")?;

    init_logging(&config.logging);
    metrics::describe();

    info!("Starting Robot System...");

    let state = AppState::from_config(&config);
    info!("Detector mode: {}", state.mode());

    // Opening a camera can block for seconds
    let camera = state.camera.clone();
    match tokio::task::spawn_blocking(move || camera.start()).await? {
        Ok(()) => info!("Camera ready"),
        Err(VisionError::DeviceUnavailable { source_id, reason }) => {
            error!(
                "Camera {} unavailable ({}). Serving without frames.",
                source_id, reason
            );
        }
        Err(e) => warn!("Camera failed to start: {}. Serving without frames.", e),
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    let app = create_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down Robot System...");
    shutdown(state.camera).await;
    info!("Fieldbot stopped");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }
}

/// Wait for shutdown signal
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

async fn shutdown(camera: Arc<fieldbot_eye::FrameSource>) {
    if let Err(e) = tokio::task::spawn_blocking(move || camera.stop()).await {
        warn!("Camera shutdown task failed: {}", e);
    }
}
