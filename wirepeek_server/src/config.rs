//! Server configuration loaded from environment variables

use std::env;
use std::time::Duration;
use wirepeek_common::constants;

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,

    /// Port the proxy listens on
    pub port: u16,

    /// Upstream every non-inspector request is forwarded to (e.g. "http://localhost:8080")
    pub target_server_url: String,

    /// Interval between heartbeats on each viewer channel
    pub heartbeat_interval: Duration,

    /// Timeout for a single upstream exchange
    pub upstream_timeout: Duration,

    /// Largest request body the forwarder will buffer
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let target_server_url = env::var("TARGET_SERVER_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .ok()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingEnv("TARGET_SERVER_URL"))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            target_server_url,
            heartbeat_interval: Duration::from_secs(parse_number(
                "HEARTBEAT_INTERVAL_SECS",
                constants::HEARTBEAT_INTERVAL_SECONDS,
            )?),
            upstream_timeout: Duration::from_secs(parse_number("UPSTREAM_TIMEOUT_SECS", 60)?),
            max_body_bytes: parse_number("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    /// Config pointed at `target` with defaults for everything else
    #[cfg(test)]
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            target_server_url: target.into(),
            heartbeat_interval: Duration::from_secs(constants::HEARTBEAT_INTERVAL_SECONDS),
            upstream_timeout: Duration::from_secs(60),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Upstream URL for a path-and-query
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.target_server_url, path_and_query)
    }

    /// Upstream WebSocket URL for a path-and-query
    pub fn upstream_ws_url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            wirepeek_common::websocket_url(&self.target_server_url),
            path_and_query
        )
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid number in environment variable: {0}")]
    InvalidNumber(&'static str),
}
