//! Push protocol spoken over the SSE channel
//!
//! Every frame is `data: <json>\n\n` carrying one [`PushMessage`].

use crate::constants::{CONNECTION_MESSAGE, SHUTDOWN_MESSAGE};
use crate::entry::CaptureEntry;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of an entry broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEvent {
    pub data: CaptureEntry,
    pub icon: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Messages sent from the server to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushMessage {
    /// First frame on every channel
    Connection {
        message: String,
        #[serde(rename = "clientId")]
        client_id: String,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Last frame before the server closes the channel
    Shutdown {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Request(EntryEvent),
    Response(EntryEvent),
    Websocket(EntryEvent),
    Error(EntryEvent),
}

impl PushMessage {
    pub fn connection(client_id: impl Into<String>) -> Self {
        PushMessage::Connection {
            message: CONNECTION_MESSAGE.to_string(),
            client_id: client_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat() -> Self {
        PushMessage::Heartbeat {
            message: "heartbeat".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn shutdown() -> Self {
        PushMessage::Shutdown {
            message: SHUTDOWN_MESSAGE.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Wrap an entry in the envelope matching its type
    pub fn entry(entry: CaptureEntry) -> Self {
        let event = EntryEvent {
            icon: entry.icon().to_string(),
            message: entry.summary(),
            timestamp: Utc::now(),
            data: entry,
        };
        match &event.data {
            CaptureEntry::Request(_) => PushMessage::Request(event),
            CaptureEntry::Response(_) => PushMessage::Response(event),
            CaptureEntry::Websocket(_) => PushMessage::Websocket(event),
            CaptureEntry::Error(_) => PushMessage::Error(event),
        }
    }

    /// Entry payload, if this message carries one
    pub fn into_entry(self) -> Option<EntryEvent> {
        match self {
            PushMessage::Request(event)
            | PushMessage::Response(event)
            | PushMessage::Websocket(event)
            | PushMessage::Error(event) => Some(event),
            _ => None,
        }
    }

    /// Encode as one SSE frame
    pub fn to_sse_frame(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
