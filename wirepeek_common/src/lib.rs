//! Wirepeek Common - Capture model and text tooling shared by the proxy and viewer
//!
//! This crate contains the capture log entry model, the body and frame codecs
//! that turn raw traffic into displayable text, the push protocol spoken over
//! the SSE channel, and the text navigation helpers used by the detail view.

pub mod body;
pub mod boundary;
pub mod entry;
pub mod frame;
pub mod headers;
pub mod history;
pub mod push;

pub use body::{decode_body, CapturedBody, CodecError};
pub use boundary::{find_boundary, is_inside_string, scan_strings, snap_selection, StringRange};
pub use entry::{CaptureEntry, Direction, EntryType, ErrorLog, RequestLog, ResponseLog, WebSocketLog};
pub use frame::{decode_frame, FramePayload};
pub use headers::{HeaderBag, HeaderValue};
pub use history::{parse_quoted_string, HistoryInfo, Selection, TextHistory};
pub use push::{EntryEvent, PushMessage};

use chrono::Utc;
use uuid::Uuid;

/// Generate a new viewer channel ID (`client_<millis>_<9 hex chars>`)
pub fn new_channel_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("client_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// Map an upstream HTTP(S) base URL onto its WebSocket scheme
pub fn websocket_url(base: &str) -> String {
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    }
}

/// Constants for the push protocol and viewer
pub mod constants {
    /// Path of the SSE push channel
    pub const SSE_PATH: &str = "/inspect/sse";

    /// Path of the inspector status endpoint
    pub const STATUS_PATH: &str = "/inspect";

    /// Path of the metrics endpoint
    pub const METRICS_PATH: &str = "/inspect/metrics";

    /// Path of the configuration dashboard endpoint
    pub const CONFIG_PATH: &str = "/inspect/config";

    /// Heartbeat interval per viewer channel
    pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 7;

    /// Viewer treats the channel as dead after this long without any frame
    pub const HEARTBEAT_TIMEOUT_SECONDS: u64 = 20;

    /// How often the viewer checks the heartbeat timeout
    pub const HEARTBEAT_CHECK_SECONDS: u64 = 15;

    /// Reconnect attempts before the viewer gives up
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// First reconnect delay, doubled per attempt
    pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

    /// Upper bound for the reconnect delay
    pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

    /// Entries kept in the viewer's ring buffer
    pub const MESSAGE_BUFFER_CAPACITY: usize = 200;

    /// Characters shown in a history breadcrumb preview
    pub const PREVIEW_CHARS: usize = 50;

    /// Body shown for every binary WebSocket frame
    pub const BINARY_FRAME_PLACEHOLDER: &str = "◆◇[BINARY_DATA]◇◆";

    /// Close code sent to relayed sockets on shutdown
    pub const SHUTDOWN_CLOSE_CODE: u16 = 1001;

    /// Close reason sent to relayed sockets on shutdown
    pub const SHUTDOWN_CLOSE_REASON: &str = "Server Shutdown";

    /// Notice written to each viewer right before shutdown
    pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down";

    /// Acknowledgment written to each viewer on registration
    pub const CONNECTION_MESSAGE: &str = "SSE connection established";
}
