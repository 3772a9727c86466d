//! MailTrace Web Server - delivery-event ingestion endpoint.
//!
//! This binary serves the tracking HTTP surface:
//! - Receives provider delivery notifications via the pub/sub webhook
//! - Verifies envelope signatures when enabled
//! - Applies each logical event to the message store exactly once
//! - Serves the open pixel and click redirect for engagement signals

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailtrace::web::{router, AppState};
use mailtrace::{Config, InMemoryStore, MessageTracker, Metrics, SignatureVerifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("tracking_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        verify_signatures = config.verify_signatures,
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    // Outbound HTTP client, shared by certificate fetches and the
    // subscription handshake.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .context("Failed to build HTTP client")?;

    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new());
    let tracker = Arc::new(MessageTracker::new(store, metrics.clone()));
    let verifier = Arc::new(SignatureVerifier::new(config.verify_signatures, client));

    // Create application state and router
    let state = AppState::new(config.clone(), verifier, tracker, metrics);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "tracking_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("tracking_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("tracking_server_shutting_down");
}
