//! Drill-down history over a captured payload
//!
//! A [`TextHistory`] records a chain of "zoom into this substring" steps.
//! Each selection's offsets are relative to the text produced by the step
//! before it, not to the original text. Quoted selections are unwrapped and
//! JSON-looking selections are re-pretty-printed.
//!
//! Offsets are char offsets.

use crate::constants::PREVIEW_CHARS;
use serde_json::Value;

/// One recorded narrowing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    /// Result is parsed and re-printed as JSON
    pub use_stringify: bool,
    pub label: Option<String>,
}

/// Breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryInfo {
    /// `None` is the original text
    pub index: Option<usize>,
    pub label: String,
    pub preview: String,
    pub is_current: bool,
}

#[derive(Debug, Clone)]
pub struct TextHistory {
    original_text: String,
    /// Text the most recent selection was taken against
    last_text: String,
    positions: Vec<Selection>,
    /// Text produced by each selection, parallel to `positions`
    rendered: Vec<String>,
    current_index: Option<usize>,
}

impl TextHistory {
    /// Start a history from an arbitrary JSON value
    ///
    /// Objects and arrays are pretty-printed, strings go through
    /// [`normalize_text`], anything else is rendered as JSON.
    pub fn from_value(value: &Value) -> Self {
        let original = match value {
            Value::String(s) => normalize_text(s),
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            other => other.to_string(),
        };
        Self::with_original(original)
    }

    /// Start a history from plain text
    pub fn from_text(text: &str) -> Self {
        Self::with_original(normalize_text(text))
    }

    fn with_original(original_text: String) -> Self {
        Self {
            last_text: original_text.clone(),
            original_text,
            positions: Vec::new(),
            rendered: Vec::new(),
            current_index: None,
        }
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    pub fn positions(&self) -> &[Selection] {
        &self.positions
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Record a selection over the current text and make it current
    ///
    /// Any steps after the current one are discarded first.
    pub fn record_selection(&mut self, start: usize, end: usize, label: Option<&str>) -> &str {
        let keep = self.current_index.map_or(0, |i| i + 1);
        self.positions.truncate(keep);
        self.rendered.truncate(keep);

        self.last_text = self.current_text().to_string();

        let slice = char_slice(&self.last_text, start, end);
        let content = parse_quoted_string(slice);
        let use_stringify = looks_like_json(content.trim());
        let rendered = render(slice, use_stringify);

        self.positions.push(Selection {
            start,
            end,
            use_stringify,
            label: label.map(str::to_string),
        });
        self.rendered.push(rendered);
        self.current_index = Some(self.positions.len() - 1);

        self.current_text()
    }

    /// Text shown for the current step
    pub fn current_text(&self) -> &str {
        match self.current_index {
            Some(i) => &self.rendered[i],
            None => &self.original_text,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.current_index.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.current_index.map_or(0, |i| i + 1) < self.positions.len()
    }

    pub fn undo(&mut self) -> &str {
        self.current_index = match self.current_index {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
        self.current_text()
    }

    pub fn redo(&mut self) -> &str {
        if self.can_redo() {
            self.current_index = Some(self.current_index.map_or(0, |i| i + 1));
        }
        self.current_text()
    }

    /// Jump to a step (`None` is the original); out-of-range indexes are ignored
    pub fn go_to(&mut self, index: Option<usize>) -> &str {
        match index {
            None => self.current_index = None,
            Some(i) if i < self.positions.len() => self.current_index = Some(i),
            Some(_) => {}
        }
        self.current_text()
    }

    /// Breadcrumbs: the original text, then one entry per step
    ///
    /// Step previews are sliced from the original text.
    pub fn history_info(&self) -> Vec<HistoryInfo> {
        let mut info = Vec::with_capacity(self.positions.len() + 1);
        info.push(HistoryInfo {
            index: None,
            label: "original".to_string(),
            preview: preview(&self.original_text),
            is_current: self.current_index.is_none(),
        });

        for (i, selection) in self.positions.iter().enumerate() {
            info.push(HistoryInfo {
                index: Some(i),
                label: selection
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("Selection {}", i + 1)),
                preview: preview(char_slice(&self.original_text, selection.start, selection.end)),
                is_current: self.current_index == Some(i),
            });
        }

        info
    }

    /// Drop every step and return to the original text
    pub fn clear(&mut self) {
        self.positions.clear();
        self.rendered.clear();
        self.current_index = None;
        self.last_text = self.original_text.clone();
    }
}

/// Pretty-print text that looks like a JSON object or array, else keep it
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if is_bracketed(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return pretty;
            }
        }
    }
    text.to_string()
}

/// Unwrap a quoted string literal into its value
///
/// Double-quoted text is read as a JSON string. Single-quoted text is
/// converted to a JSON string first, taking its contents literally. On any
/// failure the input is returned unchanged.
pub fn parse_quoted_string(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() < 2 {
        return text.to_string();
    }

    if trimmed.starts_with('"') && trimmed.ends_with('"') {
        return serde_json::from_str::<String>(trimmed).unwrap_or_else(|_| text.to_string());
    }

    if trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let json = format!("\"{}\"", inner.replace('\\', "\\\\").replace('"', "\\\""));
        return serde_json::from_str::<String>(&json).unwrap_or_else(|_| text.to_string());
    }

    text.to_string()
}

/// Slice by char offsets, clamping to the text; reversed ranges are empty
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let byte_at = |offset: usize| {
        text.char_indices()
            .nth(offset)
            .map_or(text.len(), |(byte, _)| byte)
    };
    &text[byte_at(start)..byte_at(end)]
}

/// Char offset of a byte offset
pub fn char_offset(text: &str, byte: usize) -> usize {
    text.get(..byte).map_or_else(|| text.chars().count(), |s| s.chars().count())
}

fn render(slice: &str, use_stringify: bool) -> String {
    let unwrapped = parse_quoted_string(slice);
    if !use_stringify {
        return unwrapped;
    }
    serde_json::from_str::<Value>(&unwrapped)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or(unwrapped)
}

fn looks_like_json(trimmed: &str) -> bool {
    is_bracketed(trimmed) && serde_json::from_str::<Value>(trimmed).is_ok()
}

fn is_bracketed(trimmed: &str) -> bool {
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_normalize_object_value() {
        let history = TextHistory::from_value(&json!({"b": 1, "a": [true]}));
        assert_eq!(
            history.original_text(),
            "{\n  \"b\": 1,\n  \"a\": [\n    true\n  ]\n}"
        );
        assert_eq!(history.current_text(), history.original_text());
    }

    #[test]
    fn test_normalize_json_looking_string() {
        let history = TextHistory::from_text(r#"  {"x":1}  "#);
        assert_eq!(history.original_text(), "{\n  \"x\": 1\n}");

        let broken = TextHistory::from_text("{not json}");
        assert_eq!(broken.original_text(), "{not json}");

        let plain = TextHistory::from_value(&json!(42));
        assert_eq!(plain.original_text(), "42");
    }

    #[test]
    fn test_record_selection_unwraps_and_pretty_prints() {
        let mut history = TextHistory::from_text(r#"payload: "{\"x\":1}" end"#);
        let text = history.original_text().to_string();
        let start = text.find('"').unwrap();
        let end = text.rfind('"').unwrap() + 1;

        let current = history.record_selection(start, end, Some("BODY")).to_string();
        assert_eq!(current, "{\n  \"x\": 1\n}");
        assert!(history.positions()[0].use_stringify);
        assert_eq!(history.last_text(), text);
    }

    #[test]
    fn test_chained_selection_is_relative_to_previous_result() {
        let mut history = TextHistory::from_value(&json!({"outer": "{\"inner\":\"deep value\"}"}));
        let original = history.original_text().to_string();

        // Select the quoted "outer" value
        let start = original.find("\"{").unwrap();
        let end = original.rfind('"').unwrap() + 1;
        let first = history.record_selection(start, end, None).to_string();
        assert_eq!(first, "{\n  \"inner\": \"deep value\"\n}");

        // Offsets now index into `first`, not the original
        let s2 = char_offset(&first, first.find("\"deep").unwrap());
        let e2 = s2 + len("\"deep value\"");
        let second = history.record_selection(s2, e2, None).to_string();
        assert_eq!(second, "deep value");
        assert_eq!(history.last_text(), first);
    }

    #[test]
    fn test_new_selection_discards_redo_branch() {
        let mut history = TextHistory::from_text("abcdefghij");
        history.record_selection(0, 8, Some("A"));
        history.record_selection(0, 4, Some("B"));
        assert_eq!(history.undo(), "abcdefgh");

        history.record_selection(2, 6, Some("C"));
        let labels: Vec<_> = history
            .positions()
            .iter()
            .map(|p| p.label.clone().unwrap())
            .collect();
        assert_eq!(labels, vec!["A", "C"]);
        assert_eq!(history.current_text(), "cdef");
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_bounds() {
        let mut history = TextHistory::from_text("hello world");
        assert!(!history.can_undo());
        assert_eq!(history.undo(), "hello world");

        history.record_selection(0, 5, None);
        history.record_selection(1, 3, None);
        assert_eq!(history.current_text(), "el");

        assert_eq!(history.undo(), "hello");
        assert_eq!(history.undo(), "hello world");
        assert_eq!(history.undo(), "hello world");
        assert_eq!(history.current_index(), None);

        assert_eq!(history.redo(), "hello");
        assert_eq!(history.redo(), "el");
        assert_eq!(history.redo(), "el");
    }

    #[test]
    fn test_go_to() {
        let mut history = TextHistory::from_text("0123456789");
        history.record_selection(2, 8, None);
        history.record_selection(1, 3, None);

        assert_eq!(history.go_to(Some(0)), "234567");
        assert_eq!(history.go_to(Some(5)), "234567");
        assert_eq!(history.go_to(None), "0123456789");
        assert_eq!(history.go_to(Some(1)), "34");
    }

    #[test]
    fn test_history_info() {
        let long = "x".repeat(60);
        let mut history = TextHistory::from_text(&long);
        history.record_selection(0, 10, Some("MSG"));
        history.record_selection(0, 3, None);

        let info = history.history_info();
        assert_eq!(info.len(), 3);
        assert_eq!(info[0].index, None);
        assert_eq!(info[0].label, "original");
        assert_eq!(info[0].preview, format!("{}...", "x".repeat(50)));
        assert_eq!(info[1].label, "MSG");
        assert_eq!(info[1].preview, "x".repeat(10));
        assert_eq!(info[2].label, "Selection 2");
        assert!(info[2].is_current);
        assert!(!info[0].is_current);
    }

    #[test]
    fn test_clear() {
        let mut history = TextHistory::from_text("abc");
        history.record_selection(0, 1, None);
        history.clear();
        assert!(history.positions().is_empty());
        assert_eq!(history.current_text(), "abc");
        assert_eq!(history.last_text(), "abc");
    }

    #[test]
    fn test_parse_quoted_string() {
        assert_eq!(parse_quoted_string(r#""a\nb""#), "a\nb");
        assert_eq!(parse_quoted_string(r#"  "spaced"  "#), "spaced");
        assert_eq!(parse_quoted_string("'single'"), "single");
        assert_eq!(parse_quoted_string(r#"'say "hi"'"#), r#"say "hi""#);
        assert_eq!(parse_quoted_string(r"'back\slash'"), r"back\slash");
        assert_eq!(parse_quoted_string("unquoted"), "unquoted");
        assert_eq!(parse_quoted_string(r#""broken\"#), r#""broken\"#);
        assert_eq!(parse_quoted_string("\""), "\"");
    }

    #[test]
    fn test_char_slice_multibyte() {
        assert_eq!(char_slice("héllo wörld", 1, 4), "éll");
        assert_eq!(char_slice("abc", 1, 99), "bc");
        assert_eq!(char_slice("abc", 2, 1), "");
        assert_eq!(char_offset("héllo", 3), 2);
    }
}
