//! Forwarder: reverse-proxies every non-inspector request to the target server
//!
//! Request bodies are buffered, response bodies are streamed back while a
//! copy is kept for capture. The request entry is always broadcast before
//! the response (or error) entry of the same exchange.

use crate::capture::CaptureService;
use crate::routes::{relay, AppState};
use axum::{
    body::Body,
    extract::{ws::WebSocketUpgrade, FromRequestParts, State},
    http::{Request, Response, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use std::time::Instant;
use tokio::task::JoinHandle;
use wirepeek_common::HeaderBag;

/// Fallback handler for everything outside `/inspect`
pub async fn handle_proxy(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let (mut parts, body) = request.into_parts();
    let headers = HeaderBag::from_header_map(&parts.headers);
    let url = path_and_query(&parts.uri);

    if headers.is_websocket_upgrade() {
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(ws) => relay::upgrade(ws, state, url, headers),
            Err(rejection) => rejection.into_response(),
        };
    }

    let body = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("Failed to read request body for {} {}: {}", parts.method, url, e);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Failed to read request body").into_response();
        }
    };

    let started = Instant::now();
    let method = parts.method.clone();
    let request_capture = spawn_request_capture(&state.capture, method.as_str(), &url, headers.clone(), body.clone());

    let upstream = state
        .http_client
        .request(method.clone(), state.config.upstream_url(&url))
        .headers(headers.filter_for_request().to_header_map())
        .body(body)
        .send()
        .await;

    let response = match upstream {
        Ok(response) => response,
        Err(e) => {
            let _ = request_capture.await;
            let capture = state.capture.clone();
            let method = method.to_string();
            let logged_url = url.clone();
            let _ = tokio::task::spawn_blocking(move || {
                capture.log_error(&e, Some(&method), Some(&logged_url));
            })
            .await;
            state.metrics.record_connection_error().await;
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": "Internal proxy error" })),
            )
                .into_response();
        }
    };

    let status = response.status();
    let response_headers = HeaderBag::from_header_map(response.headers());
    let relayed_headers = response_headers.clone().filter_for_response().to_header_map();

    let mut exchange = Exchange {
        state: state.clone(),
        method: method.to_string(),
        url,
        request_capture: Some(request_capture),
        started,
        status: status.as_u16(),
        headers: Some(response_headers),
        captured: Vec::new(),
    };

    // Bodies hyper never polls (HEAD, 204, 304) or that the caller abandons
    // are completed when the stream is dropped.
    let stream = async_stream::stream! {
        let mut upstream = response.bytes_stream();

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(chunk) => {
                    exchange.captured.extend_from_slice(&chunk);
                    yield Ok(chunk);
                }
                Err(e) => {
                    let message = e.to_string();
                    exchange.fail(e);
                    yield Err(std::io::Error::other(message));
                    break;
                }
            }
        }

        exchange.finish();
    };

    let mut builder = Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(relayed_headers);
    }
    builder.body(Body::from_stream(stream)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "Response build failed").into_response()
    })
}

/// One in-flight exchange waiting for its response body to complete.
///
/// Emits exactly once: on `finish`, on `fail`, or on drop with whatever was
/// captured so far.
struct Exchange {
    state: AppState,
    method: String,
    url: String,
    request_capture: Option<JoinHandle<()>>,
    started: Instant,
    status: u16,
    headers: Option<HeaderBag>,
    captured: Vec<u8>,
}

impl Exchange {
    fn finish(&mut self) {
        let (Some(request_capture), Some(headers)) = (self.request_capture.take(), self.headers.take()) else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let duration_ms = self.started.elapsed().as_millis() as u64;
        let state = self.state.clone();
        let (method, url, status) = (self.method.clone(), self.url.clone(), self.status);
        let body = Bytes::from(std::mem::take(&mut self.captured));

        runtime.spawn(async move {
            let _ = request_capture.await;
            let capture = state.capture.clone();
            let _ = tokio::task::spawn_blocking(move || {
                capture.log_response(&method, &url, status, headers, &body, duration_ms);
            })
            .await;
            state.metrics.record_exchange(status, duration_ms).await;
        });
    }

    fn fail(&mut self, error: reqwest::Error) {
        let Some(request_capture) = self.request_capture.take() else {
            return;
        };
        self.headers = None;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let state = self.state.clone();
        let (method, url) = (self.method.clone(), self.url.clone());

        runtime.spawn(async move {
            let _ = request_capture.await;
            let capture = state.capture.clone();
            let _ = tokio::task::spawn_blocking(move || {
                capture.log_error(&error, Some(&method), Some(&url));
            })
            .await;
            state.metrics.record_connection_error().await;
        });
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.finish();
    }
}

fn spawn_request_capture(
    capture: &CaptureService,
    method: &str,
    url: &str,
    headers: HeaderBag,
    body: Bytes,
) -> JoinHandle<()> {
    let capture = capture.clone();
    let (method, url) = (method.to_string(), url.to_string());
    tokio::task::spawn_blocking(move || {
        capture.log_request(&method, &url, headers, &body);
    })
}

fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| "/".to_string())
}
