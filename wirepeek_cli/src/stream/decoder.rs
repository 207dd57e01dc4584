//! Incremental `text/event-stream` parsing
//!
//! Only `data:` fields matter to the viewer. Multiple `data:` lines in one
//! event are joined with `\n`; a blank line ends the event. Comment lines
//! (leading `:`) and other fields are skipped.

use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the data of every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(newline);
            self.buffer.advance(1);

            let text = String::from_utf8_lossy(&raw);
            let line = text.strip_suffix('\r').unwrap_or(&text);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.data.push(value.to_string());
            }
        }

        events
    }

    /// Drop any partial event, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.data.clear();
    }
}
