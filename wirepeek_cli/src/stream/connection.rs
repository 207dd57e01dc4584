//! SSE connection to the inspector with heartbeat supervision and reconnects

use super::decoder::SseDecoder;
use futures_util::StreamExt;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use wirepeek_common::constants::{
    HEARTBEAT_CHECK_SECONDS, HEARTBEAT_TIMEOUT_SECONDS, MAX_RECONNECT_ATTEMPTS,
    RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS, SSE_PATH,
};
use wirepeek_common::PushMessage;

/// Connection state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered to the viewer
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status(ConnectionStatus),
    Message(PushMessage),
    /// Reconnect attempts are exhausted
    GaveUp,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("No message received for {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("Stream ended")]
    Ended,

    #[error("Server is shutting down")]
    ServerShutdown,
}

/// Capped exponential backoff over a fixed number of attempts
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            MAX_RECONNECT_ATTEMPTS,
            Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            Duration::from_millis(RECONNECT_MAX_DELAY_MS),
        )
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before the next attempt, or `None` once attempts run out
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempts);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        self.attempts += 1;
        Some(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called after a successful open
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

pub struct StreamClient {
    url: String,
    http: reqwest::Client,
    policy: ReconnectPolicy,
    heartbeat_timeout: Duration,
    check_interval: Duration,
}

impl StreamClient {
    /// Client for the SSE endpoint of the inspector at `server_url`
    pub fn new(server_url: &str) -> Result<Self, StreamError> {
        // No overall timeout: the response body is the stream itself
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url: format!("{}{}", server_url.trim_end_matches('/'), SSE_PATH),
            http,
            policy: ReconnectPolicy::default(),
            heartbeat_timeout: Duration::from_secs(HEARTBEAT_TIMEOUT_SECONDS),
            check_interval: Duration::from_secs(HEARTBEAT_CHECK_SECONDS),
        })
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_heartbeat(mut self, timeout: Duration, check_interval: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self.check_interval = check_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream messages into `tx` until the receiver is dropped or reconnects run out
    pub async fn run(mut self, tx: mpsc::Sender<StreamEvent>) {
        let mut status = ConnectionStatus::Connecting;

        loop {
            if tx.send(StreamEvent::Status(status)).await.is_err() {
                return;
            }

            match self.connect_once(&tx).await {
                Ok(()) => return,
                Err(e) => tracing::warn!("Inspector stream interrupted: {}", e),
            }

            if tx
                .send(StreamEvent::Status(ConnectionStatus::Disconnected))
                .await
                .is_err()
            {
                return;
            }

            match self.policy.next_delay() {
                Some(delay) => {
                    tracing::info!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        self.policy.attempts(),
                        self.policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    status = ConnectionStatus::Reconnecting;
                }
                None => {
                    tracing::error!("Giving up on {} after {} attempts", self.url, self.policy.max_attempts);
                    let _ = tx.send(StreamEvent::GaveUp).await;
                    return;
                }
            }
        }
    }

    /// One connection lifetime
    ///
    /// `Ok` means the viewer went away; every interruption is an error.
    async fn connect_once(&mut self, tx: &mpsc::Sender<StreamEvent>) -> Result<(), StreamError> {
        let response = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StreamError::Status(response.status().as_u16()));
        }

        tracing::debug!("Connected to {}", self.url);
        self.policy.reset();
        if tx
            .send(StreamEvent::Status(ConnectionStatus::Connected))
            .await
            .is_err()
        {
            return Ok(());
        }

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut last_message = Instant::now();
        let mut check = tokio::time::interval_at(Instant::now() + self.check_interval, self.check_interval);

        loop {
            tokio::select! {
                chunk = body.next() => {
                    let chunk = match chunk {
                        Some(Ok(chunk)) => chunk,
                        Some(Err(e)) => return Err(StreamError::Request(e)),
                        None => return Err(StreamError::Ended),
                    };

                    for data in decoder.feed(&chunk) {
                        last_message = Instant::now();

                        let message = match PushMessage::from_json(&data) {
                            Ok(message) => message,
                            Err(e) => {
                                tracing::warn!("Skipping malformed message: {}", e);
                                continue;
                            }
                        };

                        let is_shutdown = matches!(message, PushMessage::Shutdown { .. });
                        if tx.send(StreamEvent::Message(message)).await.is_err() {
                            return Ok(());
                        }
                        if is_shutdown {
                            return Err(StreamError::ServerShutdown);
                        }
                    }
                }

                _ = check.tick() => {
                    if last_message.elapsed() > self.heartbeat_timeout {
                        return Err(StreamError::HeartbeatTimeout(self.heartbeat_timeout));
                    }
                }
            }
        }
    }
}
