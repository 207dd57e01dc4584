//! Proxy traffic metrics
//!
//! Tracks exchange counts, rates (sliding windows), duration percentiles and
//! WebSocket relay activity.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use wirepeek_common::Direction;

/// Durations kept for percentile calculation
const DURATION_WINDOW: usize = 1000;

pub struct Metrics {
    started_at: Instant,
    inner: RwLock<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    status_counts: BTreeMap<u16, u64>,
    connection_errors: u64,
    open_relays: u32,
    frames_client_to_server: u64,
    frames_server_to_client: u64,

    /// Completion times for rate calculation (last 15 minutes)
    request_times: VecDeque<Instant>,

    durations: VecDeque<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub connection_errors: u64,
    pub requests_per_minute_1m: f64,
    pub requests_per_minute_5m: f64,
    pub requests_per_minute_15m: f64,
    pub p50_duration_ms: u64,
    pub p90_duration_ms: u64,
    pub p95_duration_ms: u64,
    pub p99_duration_ms: u64,
    pub open_relays: u32,
    pub frames_client_to_server: u64,
    pub frames_server_to_client: u64,
    pub viewers: usize,
    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            inner: RwLock::new(MetricsInner {
                request_times: VecDeque::with_capacity(10000),
                durations: VecDeque::with_capacity(DURATION_WINDOW),
                ..Default::default()
            }),
        }
    }

    /// Record a completed exchange
    pub async fn record_exchange(&self, status: u16, duration_ms: u64) {
        let mut inner = self.inner.write().await;
        inner.total_requests += 1;
        *inner.status_counts.entry(status).or_insert(0) += 1;

        let now = Instant::now();
        inner.request_times.push_back(now);

        if let Some(cutoff) = now.checked_sub(Duration::from_secs(15 * 60)) {
            while let Some(front) = inner.request_times.front() {
                if *front < cutoff {
                    inner.request_times.pop_front();
                } else {
                    break;
                }
            }
        }

        inner.durations.push_back(duration_ms);
        if inner.durations.len() > DURATION_WINDOW {
            inner.durations.pop_front();
        }
    }

    /// Record an exchange that never got an upstream response
    pub async fn record_connection_error(&self) {
        self.inner.write().await.connection_errors += 1;
    }

    pub async fn record_frame(&self, direction: Direction) {
        let mut inner = self.inner.write().await;
        match direction {
            Direction::ClientToServer => inner.frames_client_to_server += 1,
            Direction::ServerToClient => inner.frames_server_to_client += 1,
        }
    }

    pub async fn relay_opened(&self) {
        self.inner.write().await.open_relays += 1;
    }

    pub async fn relay_closed(&self) {
        let mut inner = self.inner.write().await;
        inner.open_relays = inner.open_relays.saturating_sub(1);
    }

    /// Current metrics; `viewers` comes from the hub
    pub async fn snapshot(&self, viewers: usize) -> MetricsSnapshot {
        let inner = self.inner.read().await;
        let now = Instant::now();

        let count_in_window = |minutes: u64| -> usize {
            match now.checked_sub(Duration::from_secs(minutes * 60)) {
                Some(cutoff) => inner.request_times.iter().filter(|t| **t >= cutoff).count(),
                None => inner.request_times.len(),
            }
        };

        let mut sorted_durations: Vec<u64> = inner.durations.iter().copied().collect();
        sorted_durations.sort_unstable();

        let percentile = |p: f64| -> u64 {
            if sorted_durations.is_empty() {
                return 0;
            }
            let idx = ((p / 100.0) * sorted_durations.len() as f64) as usize;
            sorted_durations[idx.min(sorted_durations.len() - 1)]
        };

        MetricsSnapshot {
            total_requests: inner.total_requests,
            status_counts: inner.status_counts.clone(),
            connection_errors: inner.connection_errors,
            requests_per_minute_1m: count_in_window(1) as f64,
            requests_per_minute_5m: count_in_window(5) as f64 / 5.0,
            requests_per_minute_15m: count_in_window(15) as f64 / 15.0,
            p50_duration_ms: percentile(50.0),
            p90_duration_ms: percentile(90.0),
            p95_duration_ms: percentile(95.0),
            p99_duration_ms: percentile(99.0),
            open_relays: inner.open_relays,
            frames_client_to_server: inner.frames_client_to_server,
            frames_server_to_client: inner.frames_server_to_client,
            viewers,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_counts_and_percentiles() {
        let metrics = Metrics::new();
        for ms in 1..=100 {
            let status = if ms % 10 == 0 { 500 } else { 200 };
            metrics.record_exchange(status, ms).await;
        }

        let snapshot = metrics.snapshot(3).await;
        assert_eq!(snapshot.total_requests, 100);
        assert_eq!(snapshot.status_counts[&200], 90);
        assert_eq!(snapshot.status_counts[&500], 10);
        assert_eq!(snapshot.p50_duration_ms, 51);
        assert_eq!(snapshot.p99_duration_ms, 100);
        assert_eq!(snapshot.requests_per_minute_1m, 100.0);
        assert_eq!(snapshot.viewers, 3);
    }

    #[tokio::test]
    async fn test_relay_counters() {
        let metrics = Metrics::new();
        metrics.relay_opened().await;
        metrics.relay_opened().await;
        metrics.relay_closed().await;
        metrics.relay_closed().await;
        metrics.relay_closed().await;
        metrics.record_frame(Direction::ClientToServer).await;
        metrics.record_frame(Direction::ServerToClient).await;
        metrics.record_frame(Direction::ServerToClient).await;
        metrics.record_connection_error().await;

        let snapshot = metrics.snapshot(0).await;
        assert_eq!(snapshot.open_relays, 0);
        assert_eq!(snapshot.frames_client_to_server, 1);
        assert_eq!(snapshot.frames_server_to_client, 2);
        assert_eq!(snapshot.connection_errors, 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot(0).await;
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.p95_duration_ms, 0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("statusCounts").is_some());
        assert!(json.get("uptimeSeconds").is_some());
    }
}
