//! Show inspector metrics

use crate::config::Config;
use anyhow::{Context, Result};
use std::time::Duration;
use wirepeek_common::constants::METRICS_PATH;

pub async fn run(url: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let server_url = config.server_url_or(url);

    let data = fetch_metrics(&server_url).await?;
    println!("Inspector: {}", server_url);
    println!();
    for line in render(&data) {
        println!("{}", line);
    }

    Ok(())
}

async fn fetch_metrics(server_url: &str) -> Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .get(format!("{}{}", server_url, METRICS_PATH))
        .send()
        .await
        .with_context(|| format!("Failed to reach inspector at {}", server_url))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("Failed to fetch metrics: {} - {}", status, text);
    }

    Ok(response.json().await?)
}

fn render(data: &serde_json::Value) -> Vec<String> {
    let int = |key: &str| data[key].as_u64().unwrap_or(0);
    let float = |key: &str| data[key].as_f64().unwrap_or(0.0);

    let statuses = data["statusCounts"]
        .as_object()
        .filter(|counts| !counts.is_empty())
        .map(|counts| {
            counts
                .iter()
                .map(|(status, count)| format!("{}×{}", status, count.as_u64().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_else(|| "-".to_string());

    vec![
        format!("Uptime        {}", format_uptime(int("uptimeSeconds"))),
        format!("Viewers       {}", int("viewers")),
        format!("Requests      {} ({} errors)", int("totalRequests"), int("connectionErrors")),
        format!("Statuses      {}", statuses),
        format!(
            "Rate          {:.1}/m  {:.1}/m  {:.1}/m",
            float("requestsPerMinute1m"),
            float("requestsPerMinute5m"),
            float("requestsPerMinute15m")
        ),
        format!(
            "Latency       p50 {}ms  p90 {}ms  p95 {}ms  p99 {}ms",
            int("p50DurationMs"),
            int("p90DurationMs"),
            int("p95DurationMs"),
            int("p99DurationMs")
        ),
        format!(
            "WebSockets    {} open  {}→  {}←",
            int("openRelays"),
            int("framesClientToServer"),
            int("framesServerToClient")
        ),
    ]
}

fn format_uptime(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "totalRequests": 12,
            "statusCounts": {"200": 10, "502": 2},
            "connectionErrors": 1,
            "requestsPerMinute1m": 3.0,
            "requestsPerMinute5m": 1.5,
            "requestsPerMinute15m": 0.5,
            "p50DurationMs": 8,
            "p90DurationMs": 40,
            "p95DurationMs": 55,
            "p99DurationMs": 90,
            "openRelays": 2,
            "framesClientToServer": 5,
            "framesServerToClient": 7,
            "viewers": 1,
            "uptimeSeconds": 3725
        })
    }

    #[test]
    fn test_render() {
        let lines = render(&sample());
        assert_eq!(lines[0], "Uptime        1h 2m 5s");
        assert_eq!(lines[2], "Requests      12 (1 errors)");
        assert_eq!(lines[3], "Statuses      200×10 502×2");
        assert_eq!(lines[5], "Latency       p50 8ms  p90 40ms  p95 55ms  p99 90ms");
        assert_eq!(lines[6], "WebSockets    2 open  5→  7←");
    }

    #[test]
    fn test_render_tolerates_missing_fields() {
        let lines = render(&json!({}));
        assert_eq!(lines[3], "Statuses      -");
        assert_eq!(lines[0], "Uptime        0s");
    }

    #[tokio::test]
    async fn test_fetch_metrics() {
        let router = Router::new().route(METRICS_PATH, get(|| async { Json(sample()) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let data = fetch_metrics(&format!("http://{}", addr)).await.unwrap();
        assert_eq!(data["viewers"], 1);

        let missing = fetch_metrics(&format!("http://{}/nope", addr)).await;
        assert!(missing.is_err());
    }
}
