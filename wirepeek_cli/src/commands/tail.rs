//! Plain line-per-entry output of the live stream

use crate::config::{Config, IgnoredPaths};
use crate::stream::{ConnectionStatus, StreamClient, StreamEvent};
use crate::tui::truncate_str;
use crate::viewer::{Filter, KindFilter, StoredEntry};
use anyhow::Result;
use console::style;
use tokio::sync::mpsc;
use wirepeek_common::constants::PREVIEW_CHARS;
use wirepeek_common::{CaptureEntry, EntryEvent, PushMessage};

pub struct TailOptions {
    pub url: Option<String>,
    pub kind: KindFilter,
    pub filter: Option<String>,
}

pub async fn run(opts: TailOptions) -> Result<()> {
    let config = Config::load()?;
    let server_url = config.server_url_or(opts.url);
    let ignored = IgnoredPaths::load()?;
    let filter = Filter::new(
        opts.kind,
        opts.filter.unwrap_or_default(),
        ignored.globs().to_vec(),
    );

    let client = StreamClient::new(&server_url)?;
    eprintln!(
        "{} {}",
        style("Tailing").bold(),
        style(client.url()).cyan()
    );

    let (tx, mut rx) = mpsc::channel::<StreamEvent>(256);
    let stream_task = tokio::spawn(client.run(tx));
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = rx.recv() => match event {
                Some(StreamEvent::Status(status)) => print_status(status),
                Some(StreamEvent::Message(PushMessage::Shutdown { message, .. })) => {
                    eprintln!("{}", style(message).yellow());
                }
                Some(StreamEvent::Message(message)) => {
                    if let Some(event) = message.into_entry() {
                        seq += 1;
                        let entry = StoredEntry::new(seq, event);
                        if filter.matches(&entry) {
                            println!("{}", format_entry(&entry.event));
                        }
                    }
                }
                Some(StreamEvent::GaveUp) | None => {
                    stream_task.abort();
                    anyhow::bail!("Lost connection to {}", server_url);
                }
            }
        }
    }

    stream_task.abort();
    Ok(())
}

fn print_status(status: ConnectionStatus) {
    let styled = match status {
        ConnectionStatus::Connected => style(status.as_str()).green(),
        ConnectionStatus::Disconnected => style(status.as_str()).red(),
        _ => style(status.as_str()).yellow(),
    };
    eprintln!("{} {}", style("stream").dim(), styled);
}

/// One styled line for an entry
pub fn format_entry(event: &EntryEvent) -> String {
    let timestamp = style(
        event
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
            .to_string(),
    )
    .dim();

    let detail = match &event.data {
        CaptureEntry::Request(log) => {
            format!("{} {}", style_method(&log.method), log.url)
        }
        CaptureEntry::Response(log) => {
            let duration = log
                .duration_ms
                .map(|ms| format!(" {}", style_duration(ms)))
                .unwrap_or_default();
            format!(
                "{} {} {}{}",
                style_method(&log.method),
                log.url,
                style_status(log.status_code),
                duration
            )
        }
        CaptureEntry::Websocket(log) => {
            let kind = if log.is_binary { "BINARY" } else { "TEXT" };
            format!(
                "{} {} {} {}",
                style(log.direction.arrow()).magenta(),
                style(format!("{:>6}", kind)).magenta(),
                style(format!("{}B", log.byte_length)).dim(),
                truncate_str(&log.body.replace('\n', " "), PREVIEW_CHARS)
            )
        }
        CaptureEntry::Error(log) => style(format!("Proxy error: {}", log.error)).red().to_string(),
    };

    format!("{} {} {}", timestamp, event.icon, detail)
}

fn style_method(method: &str) -> console::StyledObject<String> {
    let padded = format!("{:>7}", method);
    match method {
        "GET" => style(padded).green(),
        "POST" => style(padded).yellow(),
        "PUT" => style(padded).blue(),
        "PATCH" => style(padded).magenta(),
        "DELETE" => style(padded).red(),
        "HEAD" => style(padded).cyan(),
        _ => style(padded).white(),
    }
}

fn style_status(status: u16) -> console::StyledObject<String> {
    if status >= 500 {
        style(status.to_string()).red().bold()
    } else if status >= 400 {
        style(status.to_string()).yellow()
    } else if status >= 300 {
        style(status.to_string()).cyan()
    } else if status >= 200 {
        style(status.to_string()).green()
    } else {
        style(status.to_string()).white()
    }
}

fn style_duration(ms: u64) -> console::StyledObject<String> {
    let text = format!("{}ms", ms);
    if ms > 1000 {
        style(text).red()
    } else if ms > 500 {
        style(text).yellow()
    } else {
        style(text).green()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wirepeek_common::{Direction, FramePayload, HeaderBag};

    fn event(entry: CaptureEntry) -> EntryEvent {
        PushMessage::entry(entry).into_entry().unwrap()
    }

    #[test]
    fn test_format_response_line() {
        console::set_colors_enabled(false);
        let line = format_entry(&event(CaptureEntry::response(
            "GET",
            "/users",
            404,
            HeaderBag::new(),
            None,
            Some(12),
            Utc::now(),
        )));
        assert!(line.ends_with("❌     GET /users 404 12ms"), "{}", line);
    }

    #[test]
    fn test_format_frame_line_previews_body() {
        console::set_colors_enabled(false);
        let body = "x".repeat(80);
        let line = format_entry(&event(CaptureEntry::websocket(
            Direction::ServerToClient,
            &FramePayload::Text(body),
            false,
            Utc::now(),
        )));
        assert!(line.contains("←   TEXT 80B"), "{}", line);
        assert!(line.ends_with(&format!("{}...", "x".repeat(PREVIEW_CHARS - 3))));
    }

    #[test]
    fn test_format_error_line() {
        console::set_colors_enabled(false);
        let line = format_entry(&event(CaptureEntry::error(
            "connection refused",
            None,
            Some("GET".to_string()),
            Some("/users".to_string()),
            Utc::now(),
        )));
        assert!(line.ends_with("💥 Proxy error: connection refused"), "{}", line);
    }
}
