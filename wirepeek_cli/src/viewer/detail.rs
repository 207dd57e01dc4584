//! Drill-down view over one entry's payload

use crate::viewer::selection::{Position, TextSurface};
use crate::viewer::stream::StoredEntry;
use wirepeek_common::history::{char_offset, char_slice};
use wirepeek_common::{snap_selection, CaptureEntry, HistoryInfo, TextHistory};

/// Label of the step covering the whole payload
pub const MESSAGE_LABEL: &str = "MSG";
/// Label of the step narrowed to the `body` field
pub const BODY_LABEL: &str = "BODY";

/// Caret movements available in the detail pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretMove {
    Left,
    Right,
    Up,
    Down,
    PageUp(usize),
    PageDown(usize),
    LineStart,
    LineEnd,
}

pub struct DetailView {
    pub entry_id: u64,
    pub title: String,
    history: TextHistory,
    auto_snap: bool,
    /// Candidate range waiting for an explicit apply
    pending: Option<(usize, usize)>,
    /// Released selection waiting to be snapped into `pending`
    released: Option<(usize, usize)>,
    surface: TextSurface,
    caret: Position,
    anchor: Option<Position>,
}

impl DetailView {
    /// Seed a fresh history from an entry
    ///
    /// HTTP and error entries start from the whole serialized entry; frames
    /// start from their text. A `MSG` step is recorded over everything, then
    /// a `BODY` step when the payload is an object carrying a `body` field.
    pub fn open(entry: &StoredEntry, auto_snap: bool) -> Self {
        let data = &entry.event.data;
        let mut history = match data {
            CaptureEntry::Websocket(log) => TextHistory::from_text(&log.body),
            other => match serde_json::to_value(other) {
                Ok(value) => TextHistory::from_value(&value),
                Err(_) => TextHistory::from_text(other.body().unwrap_or_default()),
            },
        };

        let len = history.current_text().chars().count();
        history.record_selection(0, len, Some(MESSAGE_LABEL));

        if let Some((start, end)) = body_range(history.current_text()) {
            history.record_selection(start, end, Some(BODY_LABEL));
        }

        let surface = TextSurface::new(history.current_text());
        Self {
            entry_id: entry.id,
            title: entry.event.message.clone(),
            history,
            auto_snap,
            pending: None,
            released: None,
            surface,
            caret: Position::default(),
            anchor: None,
        }
    }

    pub fn current_text(&self) -> &str {
        self.history.current_text()
    }

    pub fn history(&self) -> &TextHistory {
        &self.history
    }

    pub fn history_info(&self) -> Vec<HistoryInfo> {
        self.history.history_info()
    }

    pub fn auto_snap(&self) -> bool {
        self.auto_snap
    }

    pub fn toggle_auto_snap(&mut self) {
        self.auto_snap = !self.auto_snap;
    }

    pub fn pending(&self) -> Option<(usize, usize)> {
        self.pending
    }

    /// Text of the pending candidate
    pub fn pending_text(&self) -> Option<&str> {
        self.pending
            .map(|(start, end)| char_slice(self.current_text(), start, end))
    }

    /// Offer a selection over the current text as the next candidate
    ///
    /// Empty or out-of-range selections are ignored and leave any previous
    /// candidate in place. Returns whether a candidate was stored.
    pub fn offer_selection(&mut self, start: usize, end: usize) -> bool {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if start == end || end > self.surface.len() {
            return false;
        }

        let range = if self.auto_snap {
            snap_selection(self.current_text(), start, end)
        } else {
            (start, end)
        };
        self.pending = Some(range);
        true
    }

    /// Record the pending candidate as a new step
    pub fn apply_pending(&mut self) -> bool {
        match self.pending.take() {
            Some((start, end)) => {
                self.history.record_selection(start, end, None);
                self.text_changed();
                true
            }
            None => false,
        }
    }

    pub fn undo(&mut self) {
        self.history.undo();
        self.text_changed();
    }

    pub fn redo(&mut self) {
        self.history.redo();
        self.text_changed();
    }

    /// Jump to a breadcrumb (`None` is the original text)
    pub fn go_to(&mut self, index: Option<usize>) {
        self.history.go_to(index);
        self.text_changed();
    }

    /// Current text in a form usable as a one-line filter
    pub fn filter_text(&self) -> String {
        let text = self.current_text().trim();
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                value.to_string()
            }
            _ => text.to_string(),
        }
    }

    pub fn surface(&self) -> &TextSurface {
        &self.surface
    }

    pub fn caret(&self) -> Position {
        self.caret
    }

    pub fn anchor(&self) -> Option<Position> {
        self.anchor
    }

    pub fn move_caret(&mut self, movement: CaretMove) {
        let surface = &self.surface;
        self.caret = match movement {
            CaretMove::Left => surface.left(self.caret),
            CaretMove::Right => surface.right(self.caret),
            CaretMove::Up => surface.up(self.caret, 1),
            CaretMove::Down => surface.down(self.caret, 1),
            CaretMove::PageUp(rows) => surface.up(self.caret, rows),
            CaretMove::PageDown(rows) => surface.down(self.caret, rows),
            CaretMove::LineStart => Position::new(self.caret.line, 0),
            CaretMove::LineEnd => Position::new(
                self.caret.line,
                surface.line_len(self.caret.line).unwrap_or(0),
            ),
        };
    }

    /// Start a selection at the caret, or release it
    ///
    /// Releasing holds the range between anchor and caret until
    /// `settle_selection` offers it. Returns whether a range was released.
    pub fn toggle_anchor(&mut self) -> bool {
        match self.anchor.take() {
            None => {
                self.anchor = Some(self.caret);
                false
            }
            Some(anchor) => match self.surface.selection_range(anchor, self.caret) {
                Some(range) => {
                    self.released = Some(range);
                    true
                }
                None => false,
            },
        }
    }

    pub fn released(&self) -> Option<(usize, usize)> {
        self.released
    }

    /// Offer the last released selection as the candidate
    pub fn settle_selection(&mut self) -> bool {
        match self.released.take() {
            Some((start, end)) => self.offer_selection(start, end),
            None => false,
        }
    }

    /// Live selection between the anchor and the caret
    pub fn live_selection(&self) -> Option<(usize, usize)> {
        self.anchor
            .and_then(|anchor| self.surface.selection_range(anchor, self.caret))
    }

    fn text_changed(&mut self) {
        self.pending = None;
        self.released = None;
        self.anchor = None;
        self.surface = TextSurface::new(self.history.current_text());
        self.caret = Position::default();
    }
}

/// Char range of the top-level `body` value inside pretty-printed JSON
fn body_range(text: &str) -> Option<(usize, usize)> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let body = value.as_object()?.get("body")?;
    let serialized = match body {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => return None,
        scalar => serde_json::to_string(scalar).ok()?,
    };

    let key = "\n  \"body\": ";
    let needle = format!("{}{}", key, serialized);
    let byte = text.find(&needle)? + key.len();
    let start = char_offset(text, byte);
    Some((start, start + serialized.chars().count()))
}
