//! Route handlers for the Wirepeek server

pub mod inspect;
pub mod proxy;
pub mod relay;

use crate::{capture::CaptureService, config::Config, hub::BroadcastHub, metrics::Metrics};
use axum::Router;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: Arc<BroadcastHub>,
    pub capture: CaptureService,
    pub metrics: Arc<Metrics>,
    /// Pooled client for upstream HTTP exchanges
    pub http_client: reqwest::Client,
    /// Flipped to `true` once the process starts shutting down
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.upstream_timeout)
            .build()?;

        let hub = BroadcastHub::new(config.heartbeat_interval);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            capture: CaptureService::new(hub.clone()),
            hub,
            metrics: Arc::new(Metrics::new()),
            http_client,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    /// Receiver that changes once shutdown begins
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Close every viewer channel, then tell open relays to close
    pub fn begin_shutdown(&self) {
        self.hub.shutdown();
        self.shutdown_tx.send_replace(true);
    }
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(inspect::router())
        .fallback(proxy::handle_proxy)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
