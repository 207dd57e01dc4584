//! Inspector endpoints: status, live SSE channel, metrics and config

use crate::hub::{BroadcastHub, SseSink};
use crate::metrics::MetricsSnapshot;
use crate::routes::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use std::convert::Infallible;
use std::sync::Arc;
use wirepeek_common::constants;

/// Build the inspector router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(constants::STATUS_PATH, get(status))
        .route(constants::SSE_PATH, get(sse_handler))
        .route(constants::METRICS_PATH, get(metrics))
        .route(constants::CONFIG_PATH, get(config))
}

async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Wirepeek inspector is running",
        "timestamp": Utc::now(),
        "endpoints": {
            "sse": constants::SSE_PATH,
            "metrics": constants::METRICS_PATH,
            "config": constants::CONFIG_PATH,
        }
    }))
}

/// Removes the channel when the response body is dropped
struct ChannelGuard {
    hub: Arc<BroadcastHub>,
    id: String,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.hub.remove(&self.id);
    }
}

/// Open a push channel for one viewer
async fn sse_handler(State(state): State<AppState>) -> Response<Body> {
    let (sink, mut rx) = SseSink::new();
    let id = state.hub.register(Arc::new(sink));
    let guard = ChannelGuard {
        hub: state.hub.clone(),
        id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(frame);
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open channel").into_response()
        })
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(state.hub.len()).await)
}

async fn config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "environment": {
            "targetServerUrl": state.config.target_server_url,
        }
    }))
}
