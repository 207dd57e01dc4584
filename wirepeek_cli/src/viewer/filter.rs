//! Visibility filter applied over the stored entries at render time

use crate::viewer::stream::StoredEntry;
use std::fmt;
use wirepeek_common::EntryType;

/// Entry kinds selectable in the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum KindFilter {
    #[default]
    All,
    Http,
    Websocket,
}

impl KindFilter {
    pub fn matches(&self, entry_type: EntryType) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Http => entry_type.is_http(),
            KindFilter::Websocket => entry_type == EntryType::Websocket,
        }
    }

    /// Cycle all -> http -> websocket -> all
    pub fn next(&self) -> Self {
        match self {
            KindFilter::All => KindFilter::Http,
            KindFilter::Http => KindFilter::Websocket,
            KindFilter::Websocket => KindFilter::All,
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KindFilter::All => "all",
            KindFilter::Http => "http",
            KindFilter::Websocket => "websocket",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub kind: KindFilter,
    /// Case-insensitive substring
    pub text: String,
    pub ignored_globs: Vec<String>,
}

impl Filter {
    pub fn new(kind: KindFilter, text: impl Into<String>, ignored_globs: Vec<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            ignored_globs,
        }
    }

    /// Whether an entry is visible under this filter
    pub fn matches(&self, entry: &StoredEntry) -> bool {
        let data = &entry.event.data;

        if let Some(url) = data.url() {
            if self.ignored_globs.iter().any(|glob| wildcard_match(glob, url)) {
                return false;
            }
        }

        if !self.kind.matches(data.entry_type()) {
            return false;
        }

        let needle = self.text.trim().to_lowercase();
        needle.is_empty() || entry.search_text().contains(&needle)
    }

    pub fn is_active(&self) -> bool {
        self.kind != KindFilter::All || !self.text.trim().is_empty() || !self.ignored_globs.is_empty()
    }
}

/// Match `value` against a glob where `*` is any run of characters
///
/// The whole value must match; comparison is case-sensitive.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return false,
    };

    if !value.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for part in middle {
        if part.is_empty() {
            continue;
        }
        match value[pos..].find(part) {
            Some(index) => pos += index + part.len(),
            None => return false,
        }
    }

    value[pos..].ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::stream::MessageStream;
    use chrono::Utc;
    use wirepeek_common::{CaptureEntry, Direction, FramePayload, HeaderBag, PushMessage};

    fn event(entry: CaptureEntry) -> wirepeek_common::EntryEvent {
        PushMessage::entry(entry).into_entry().unwrap()
    }

    fn sample_stream() -> MessageStream {
        let mut stream = MessageStream::new(10);
        stream.push(event(CaptureEntry::request(
            "GET",
            "/api/users",
            HeaderBag::new(),
            None,
            Utc::now(),
        )));
        stream.push(event(CaptureEntry::response(
            "GET",
            "/health",
            200,
            HeaderBag::new(),
            None,
            Some(1),
            Utc::now(),
        )));
        stream.push(event(CaptureEntry::websocket(
            Direction::ClientToServer,
            &FramePayload::Text("{\"op\":\"Subscribe\"}".into()),
            false,
            Utc::now(),
        )));
        stream.push(event(CaptureEntry::error(
            "connection refused",
            None,
            None,
            None,
            Utc::now(),
        )));
        stream
    }

    fn visible_summaries(stream: &MessageStream, filter: &Filter) -> Vec<String> {
        stream
            .visible(filter)
            .map(|entry| entry.event.message.clone())
            .collect()
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("/health", "/health"));
        assert!(!wildcard_match("/health", "/healthz"));
        assert!(wildcard_match("/health*", "/healthz"));
        assert!(wildcard_match("*.png", "/static/logo.png"));
        assert!(!wildcard_match("*.png", "/static/logo.png?v=1"));
        assert!(wildcard_match("/api/*/items", "/api/42/items"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*a", "aa"));
        assert!(!wildcard_match("a*a", "a"));
        assert!(!wildcard_match("ab*bc", "abc"));
        assert!(!wildcard_match("/Health", "/health"));
    }

    #[test]
    fn test_kind_filter() {
        let stream = sample_stream();

        let http = Filter::new(KindFilter::Http, "", vec![]);
        assert_eq!(visible_summaries(&stream, &http).len(), 2);

        let ws = Filter::new(KindFilter::Websocket, "", vec![]);
        let shown = visible_summaries(&stream, &ws);
        assert_eq!(shown, vec!["WebSocket →: TEXT (18 bytes)"]);

        assert_eq!(visible_summaries(&stream, &Filter::default()).len(), 4);
    }

    #[test]
    fn test_text_filter_is_case_insensitive_over_data() {
        let stream = sample_stream();

        let filter = Filter::new(KindFilter::All, "SUBSCRIBE", vec![]);
        assert_eq!(visible_summaries(&stream, &filter).len(), 1);

        let filter = Filter::new(KindFilter::All, "refused", vec![]);
        assert_eq!(
            visible_summaries(&stream, &filter),
            vec!["Proxy error: connection refused"]
        );
    }

    #[test]
    fn test_ignored_globs_suppress_regardless_of_kind() {
        let stream = sample_stream();

        let filter = Filter::new(KindFilter::All, "", vec!["/health*".to_string()]);
        let shown = visible_summaries(&stream, &filter);
        assert_eq!(shown.len(), 3);
        assert!(shown.iter().all(|s| !s.contains("/health")));

        // Entries without a url are never suppressed
        let filter = Filter::new(KindFilter::All, "", vec!["*".to_string()]);
        assert_eq!(visible_summaries(&stream, &filter).len(), 2);
    }
}
