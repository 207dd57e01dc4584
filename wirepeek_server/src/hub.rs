//! Viewer channel registry and fan-out
//!
//! Every connected viewer owns one channel. Broadcasts serialize a message
//! once and write the same frame to every channel; a failing channel is
//! removed without affecting the others.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wirepeek_common::{new_channel_id, PushMessage};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("write failed: {0}")]
    Write(String),
}

/// Transport behind one viewer channel
pub trait ViewerSink: Send + Sync {
    fn write(&self, frame: Bytes) -> Result<(), ChannelError>;

    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Sink feeding an SSE response body
pub struct SseSink {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl SseSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl ViewerSink for SseSink {
    fn write(&self, frame: Bytes) -> Result<(), ChannelError> {
        let guard = self
            .tx
            .lock()
            .map_err(|e| ChannelError::Write(e.to_string()))?;
        match guard.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        }
    }

    fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }

    fn is_closed(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.as_ref().map_or(true, |tx| tx.is_closed()),
            Err(_) => true,
        }
    }
}

struct Registration {
    sink: Arc<dyn ViewerSink>,
    heartbeat: Option<JoinHandle<()>>,
    registered_at: DateTime<Utc>,
}

/// Registry of live viewer channels
pub struct BroadcastHub {
    channels: DashMap<String, Registration>,
    heartbeat_interval: Duration,
}

impl BroadcastHub {
    pub fn new(heartbeat_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            heartbeat_interval,
        })
    }

    /// Add a channel, send the connection acknowledgment and start its heartbeat
    pub fn register(self: &Arc<Self>, sink: Arc<dyn ViewerSink>) -> String {
        let id = new_channel_id();

        match PushMessage::connection(&id).to_sse_frame() {
            Ok(frame) => {
                if let Err(e) = sink.write(frame) {
                    tracing::warn!("Viewer {} failed before registration: {}", id, e);
                    sink.close();
                    return id;
                }
            }
            Err(e) => tracing::error!("Failed to encode connection message: {}", e),
        }

        self.channels.insert(
            id.clone(),
            Registration {
                sink: sink.clone(),
                heartbeat: None,
                registered_at: Utc::now(),
            },
        );

        let heartbeat = spawn_heartbeat(Arc::downgrade(self), id.clone(), sink, self.heartbeat_interval);
        match self.channels.get_mut(&id) {
            Some(mut registration) => registration.heartbeat = Some(heartbeat),
            // Removed before the heartbeat was attached
            None => heartbeat.abort(),
        }

        tracing::info!("Viewer {} connected ({} active)", id, self.channels.len());
        id
    }

    /// Send a message to every channel
    ///
    /// Returns the number of channels the frame was written to.
    pub fn broadcast(&self, message: &PushMessage) -> usize {
        if self.channels.is_empty() {
            return 0;
        }

        let frame = match message.to_sse_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let snapshot: Vec<(String, Arc<dyn ViewerSink>)> = self
            .channels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().sink.clone()))
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, sink) in snapshot {
            match sink.write(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("Dropping viewer {}: {}", id, e);
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.remove(&id);
        }

        delivered
    }

    /// Drop a channel; unknown ids are ignored
    pub fn remove(&self, id: &str) {
        if let Some((_, registration)) = self.channels.remove(id) {
            if let Some(heartbeat) = registration.heartbeat {
                heartbeat.abort();
            }
            if !registration.sink.is_closed() {
                registration.sink.close();
            }
            let lifetime = Utc::now() - registration.registered_at;
            tracing::info!(
                "Viewer {} disconnected after {}s ({} active)",
                id,
                lifetime.num_seconds(),
                self.channels.len()
            );
        }
    }

    /// Notify and close every channel, then clear the registry
    pub fn shutdown(&self) {
        let notice = PushMessage::shutdown().to_sse_frame().ok();
        let ids: Vec<String> = self.channels.iter().map(|entry| entry.key().clone()).collect();

        for id in ids {
            if let Some((_, registration)) = self.channels.remove(&id) {
                if let Some(heartbeat) = registration.heartbeat {
                    heartbeat.abort();
                }
                if let Some(frame) = notice.clone() {
                    if let Err(e) = registration.sink.write(frame) {
                        tracing::debug!("Shutdown notice to viewer {} not delivered: {}", id, e);
                    }
                }
                registration.sink.close();
            }
        }

        tracing::info!("Closed all viewer channels");
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }
}

fn spawn_heartbeat(
    hub: Weak<BroadcastHub>,
    id: String,
    sink: Arc<dyn ViewerSink>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(hub) = hub.upgrade() else { break };

            let alive = !sink.is_closed()
                && match PushMessage::heartbeat().to_sse_frame() {
                    Ok(frame) => sink.write(frame).is_ok(),
                    Err(_) => false,
                };

            if !alive {
                tracing::debug!("Heartbeat failed for viewer {}", id);
                hub.remove(&id);
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wirepeek_common::{CaptureEntry, HeaderBag};

    /// Sink recording frames, optionally failing every write
    #[derive(Default)]
    struct MockSink {
        frames: Mutex<Vec<Bytes>>,
        fail: AtomicBool,
        closed: AtomicBool,
    }

    impl MockSink {
        fn failing() -> Self {
            let sink = Self::default();
            sink.fail.store(true, Ordering::SeqCst);
            sink
        }

        fn messages(&self) -> Vec<serde_json::Value> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|frame| {
                    let text = std::str::from_utf8(frame).unwrap();
                    serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap()
                })
                .collect()
        }
    }

    impl ViewerSink for MockSink {
        fn write(&self, frame: Bytes) -> Result<(), ChannelError> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(ChannelError::Closed);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChannelError::Write("broken pipe".to_string()));
            }
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn sample_message() -> PushMessage {
        PushMessage::entry(CaptureEntry::request(
            "GET",
            "/ping",
            HeaderBag::new(),
            None,
            Utc::now(),
        ))
    }

    #[tokio::test]
    async fn test_register_sends_connection_ack() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        let sink = Arc::new(MockSink::default());
        let id = hub.register(sink.clone());

        assert!(hub.contains(&id));
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "connection");
        assert_eq!(messages[0]["clientId"], id.as_str());
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failing_channel() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        let first = Arc::new(MockSink::default());
        let second = Arc::new(MockSink::default());
        let third = Arc::new(MockSink::default());

        hub.register(first.clone());
        let second_id = hub.register(second.clone());
        hub.register(third.clone());
        second.fail.store(true, Ordering::SeqCst);

        let delivered = hub.broadcast(&sample_message());

        assert_eq!(delivered, 2);
        assert_eq!(hub.len(), 2);
        assert!(!hub.contains(&second_id));
        assert!(second.is_closed());
        assert_eq!(first.messages().last().unwrap()["type"], "request");
        assert_eq!(third.messages().last().unwrap()["type"], "request");
    }

    #[tokio::test]
    async fn test_broadcast_without_channels_is_noop() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        assert_eq!(hub.broadcast(&sample_message()), 0);
    }

    #[tokio::test]
    async fn test_register_failing_sink_is_not_kept() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        let sink = Arc::new(MockSink::failing());
        let id = hub.register(sink.clone());
        assert!(!hub.contains(&id));
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        let sink = Arc::new(MockSink::default());
        let id = hub.register(sink.clone());

        hub.remove(&id);
        hub.remove(&id);
        hub.remove("client_unknown");

        assert!(hub.is_empty());
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_notifies_and_closes() {
        let hub = BroadcastHub::new(Duration::from_secs(60));
        let first = Arc::new(MockSink::default());
        let broken = Arc::new(MockSink::default());
        hub.register(first.clone());
        hub.register(broken.clone());
        broken.fail.store(true, Ordering::SeqCst);

        hub.shutdown();

        assert!(hub.is_empty());
        assert!(first.is_closed());
        assert!(broken.is_closed());
        assert_eq!(first.messages().last().unwrap()["type"], "shutdown");
    }

    #[tokio::test]
    async fn test_heartbeat_and_removal_on_failure() {
        let hub = BroadcastHub::new(Duration::from_millis(50));
        let sink = Arc::new(MockSink::default());
        let id = hub.register(sink.clone());

        tokio::time::sleep(Duration::from_millis(180)).await;
        let heartbeats = sink
            .messages()
            .iter()
            .filter(|m| m["type"] == "heartbeat")
            .count();
        assert!(heartbeats >= 2, "expected heartbeats, got {}", heartbeats);

        sink.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!hub.contains(&id));
    }

    #[tokio::test]
    async fn test_sse_sink_closes_receiver() {
        let (sink, mut rx) = SseSink::new();
        sink.write(Bytes::from_static(b"data: {}\n\n")).unwrap();
        sink.close();

        assert!(sink.is_closed());
        assert!(sink.write(Bytes::from_static(b"x")).is_err());
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"data: {}\n\n"));
        assert!(rx.recv().await.is_none());
    }
}
