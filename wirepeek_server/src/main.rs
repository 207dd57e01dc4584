//! Wirepeek Server - Inspecting reverse proxy
//!
//! This server handles:
//! - Forwarding HTTP traffic to the configured target server
//! - Relaying WebSocket connections frame by frame
//! - Capturing every exchange as a log entry
//! - Pushing entries to live viewers over SSE

mod capture;
mod config;
mod hub;
mod metrics;
mod routes;

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wirepeek_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Starting Wirepeek on {}:{}", config.host, config.port);
    tracing::info!("Forwarding to {}", config.target_server_url);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = routes::AppState::new(config)?;
    let app = routes::app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Inspector stream at http://{}{}", addr, wirepeek_common::constants::SSE_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then close viewers and relays
async fn shutdown_signal(state: routes::AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    state.begin_shutdown();
}
