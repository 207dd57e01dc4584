//! Capture log entry model
//!
//! One immutable entry is built per observed request, response, WebSocket
//! frame or proxy error. Bodies are decoded once, here, so every entry is
//! ready for serialization and display.

use crate::body::{decode_body, CapturedBody};
use crate::frame::{decode_frame, FramePayload};
use crate::headers::HeaderBag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry discriminant used for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Request,
    Response,
    Websocket,
    Error,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Request => "request",
            EntryType::Response => "response",
            EntryType::Websocket => "websocket",
            EntryType::Error => "error",
        }
    }

    /// Request and response entries
    pub fn is_http(&self) -> bool {
        matches!(self, EntryType::Request | EntryType::Response)
    }
}

/// Direction of a relayed WebSocket frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::ClientToServer => "→",
            Direction::ServerToClient => "←",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLog {
    pub method: String,
    pub url: String,
    pub headers: HeaderBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseLog {
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub headers: HeaderBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Time from request capture to the end of the response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketLog {
    pub direction: Direction,
    pub body: String,
    pub is_binary: bool,
    /// Size of the frame as received, even when the body is elided
    pub byte_length: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One captured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "lowercase")]
pub enum CaptureEntry {
    Request(RequestLog),
    Response(ResponseLog),
    Websocket(WebSocketLog),
    Error(ErrorLog),
}

impl CaptureEntry {
    /// Request entry with its body decoded from the declared headers
    pub fn request(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: HeaderBag,
        body: Option<CapturedBody<'_>>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let body = decode_body(body, &headers);
        CaptureEntry::Request(RequestLog {
            method: method.into(),
            url: url.into(),
            headers,
            body,
            timestamp,
        })
    }

    /// Response entry with its body decoded from the response headers
    pub fn response(
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: u16,
        headers: HeaderBag,
        body: Option<CapturedBody<'_>>,
        duration_ms: Option<u64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let body = decode_body(body, &headers);
        CaptureEntry::Response(ResponseLog {
            method: method.into(),
            url: url.into(),
            status_code,
            headers,
            body,
            duration_ms,
            timestamp,
        })
    }

    /// WebSocket entry; the byte length is taken from the raw payload
    pub fn websocket(
        direction: Direction,
        payload: &FramePayload,
        is_binary: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        CaptureEntry::Websocket(WebSocketLog {
            direction,
            body: decode_frame(payload, is_binary),
            is_binary,
            byte_length: payload.byte_len(),
            timestamp,
        })
    }

    pub fn error(
        error: impl Into<String>,
        stack: Option<String>,
        method: Option<String>,
        url: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        CaptureEntry::Error(ErrorLog {
            error: error.into(),
            stack,
            method,
            url,
            timestamp,
        })
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            CaptureEntry::Request(_) => EntryType::Request,
            CaptureEntry::Response(_) => EntryType::Response,
            CaptureEntry::Websocket(_) => EntryType::Websocket,
            CaptureEntry::Error(_) => EntryType::Error,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CaptureEntry::Request(log) => log.timestamp,
            CaptureEntry::Response(log) => log.timestamp,
            CaptureEntry::Websocket(log) => log.timestamp,
            CaptureEntry::Error(log) => log.timestamp,
        }
    }

    /// URL of the exchange, if the entry has one
    pub fn url(&self) -> Option<&str> {
        match self {
            CaptureEntry::Request(log) => Some(&log.url),
            CaptureEntry::Response(log) => Some(&log.url),
            CaptureEntry::Error(log) => log.url.as_deref(),
            CaptureEntry::Websocket(_) => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            CaptureEntry::Request(log) => log.body.as_deref(),
            CaptureEntry::Response(log) => log.body.as_deref(),
            CaptureEntry::Websocket(log) => Some(&log.body),
            CaptureEntry::Error(_) => None,
        }
    }

    /// Display glyph for the entry
    pub fn icon(&self) -> &'static str {
        match self {
            CaptureEntry::Request(_) => "📥",
            CaptureEntry::Response(log) if log.status_code >= 400 => "❌",
            CaptureEntry::Response(log) if log.status_code >= 300 => "🔄",
            CaptureEntry::Response(_) => "✅",
            CaptureEntry::Websocket(_) => "🔌",
            CaptureEntry::Error(_) => "💥",
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        match self {
            CaptureEntry::Request(log) => format!("Request: {} {}", log.method, log.url),
            CaptureEntry::Response(log) => format!(
                "Response: {} {} -> {}",
                log.method, log.url, log.status_code
            ),
            CaptureEntry::Websocket(log) => format!(
                "WebSocket {}: {} ({} bytes)",
                log.direction.arrow(),
                if log.is_binary { "BINARY" } else { "TEXT" },
                log.byte_length
            ),
            CaptureEntry::Error(log) => format!("Proxy error: {}", log.error),
        }
    }
}
