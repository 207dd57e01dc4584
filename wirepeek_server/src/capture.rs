//! Capture service: turns observed traffic into entries and broadcasts them
//!
//! Methods are synchronous and may decompress large bodies; async callers
//! run them on the blocking pool.

use crate::hub::BroadcastHub;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use wirepeek_common::{CaptureEntry, CapturedBody, Direction, FramePayload, HeaderBag, PushMessage};

#[derive(Clone)]
pub struct CaptureService {
    hub: Arc<BroadcastHub>,
}

impl CaptureService {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }

    pub fn log_request(&self, method: &str, url: &str, headers: HeaderBag, body: &Bytes) -> CaptureEntry {
        let entry = CaptureEntry::request(method, url, headers, captured(body), Utc::now());
        tracing::info!("{} {}", method, url);
        self.publish(entry)
    }

    pub fn log_response(
        &self,
        method: &str,
        url: &str,
        status_code: u16,
        headers: HeaderBag,
        body: &Bytes,
        duration_ms: u64,
    ) -> CaptureEntry {
        let entry = CaptureEntry::response(
            method,
            url,
            status_code,
            headers,
            captured(body),
            Some(duration_ms),
            Utc::now(),
        );
        if status_code >= 500 {
            tracing::warn!("{} {} -> {} ({}ms)", method, url, status_code, duration_ms);
        } else {
            tracing::info!("{} {} -> {} ({}ms)", method, url, status_code, duration_ms);
        }
        self.publish(entry)
    }

    pub fn log_error(
        &self,
        error: &(dyn std::error::Error + 'static),
        method: Option<&str>,
        url: Option<&str>,
    ) -> CaptureEntry {
        let entry = CaptureEntry::error(
            error.to_string(),
            error_chain(error),
            method.map(str::to_string),
            url.map(str::to_string),
            Utc::now(),
        );
        tracing::error!(
            "Proxy error on {} {}: {}",
            method.unwrap_or("-"),
            url.unwrap_or("-"),
            error
        );
        self.publish(entry)
    }

    pub fn log_websocket(&self, direction: Direction, payload: &FramePayload, is_binary: bool) -> CaptureEntry {
        let entry = CaptureEntry::websocket(direction, payload, is_binary, Utc::now());
        tracing::debug!("{}", entry.summary());
        self.publish(entry)
    }

    fn publish(&self, entry: CaptureEntry) -> CaptureEntry {
        self.hub.broadcast(&PushMessage::entry(entry.clone()));
        entry
    }
}

fn captured(body: &Bytes) -> Option<CapturedBody<'_>> {
    (!body.is_empty()).then(|| CapturedBody::Bytes(body))
}

/// Source chain rendered one cause per line, if there is one
fn error_chain(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {}", cause));
        source = cause.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}
