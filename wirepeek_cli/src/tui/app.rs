//! TUI application state and event handling

use crate::config::IgnoredPaths;
use crate::stream::{ConnectionStatus, StreamEvent};
use crate::viewer::{
    AutoScroll, CaretMove, Debouncer, DetailView, Filter, KindFilter, MessageStream,
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use std::time::Instant;
use wirepeek_common::PushMessage;

/// TUI view modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing into the filter box
    Filter,
}

/// Events that can be sent to the TUI
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Message or status change from the inspector stream
    Stream(StreamEvent),
    /// Key event from terminal
    Key(KeyEvent),
    /// Tick for debounced work and redraws
    Tick,
}

/// Options the viewer starts with
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub server_url: String,
    pub buffer_capacity: usize,
    pub auto_snap: bool,
    pub kind: KindFilter,
    pub ignored: IgnoredPaths,
    /// Where ignored globs are saved; `None` keeps them in memory only
    pub ignored_file: Option<PathBuf>,
}

/// TUI application state
pub struct TuiApp {
    pub view: View,
    pub input_mode: InputMode,
    pub server_url: String,
    pub status: ConnectionStatus,
    pub client_id: Option<String>,
    /// Last notice worth showing in the header
    pub notice: Option<String>,
    pub stream: MessageStream,
    pub filter: Filter,
    /// Filter box contents, applied to `filter` after a pause in typing
    pub filter_input: String,
    filter_debounce: Debouncer,
    ignored: IgnoredPaths,
    ignored_file: Option<PathBuf>,
    pub scroll: AutoScroll,
    pub detail: Option<DetailView>,
    pub detail_scroll: AutoScroll,
    /// Snaps a released selection after the caret settles
    selection_debounce: Debouncer,
    pub auto_snap: bool,
    pub should_quit: bool,
}

impl TuiApp {
    pub fn new(options: ViewerOptions) -> Self {
        let filter = Filter::new(options.kind, "", options.ignored.globs().to_vec());
        Self {
            view: View::List,
            input_mode: InputMode::Normal,
            server_url: options.server_url,
            status: ConnectionStatus::Disconnected,
            client_id: None,
            notice: None,
            stream: MessageStream::new(options.buffer_capacity),
            filter,
            filter_input: String::new(),
            filter_debounce: Debouncer::default(),
            ignored: options.ignored,
            ignored_file: options.ignored_file,
            scroll: AutoScroll::default(),
            detail: None,
            detail_scroll: AutoScroll::new(0),
            selection_debounce: Debouncer::default(),
            auto_snap: options.auto_snap,
            should_quit: false,
        }
    }

    /// Ids of the entries shown under the current filter, oldest first
    pub fn visible_ids(&self) -> Vec<u64> {
        self.stream.visible(&self.filter).map(|entry| entry.id).collect()
    }

    /// Row of the highlighted entry among the visible ones
    pub fn selected_row(&self) -> Option<usize> {
        let active = self.stream.active()?;
        self.stream
            .visible(&self.filter)
            .position(|entry| entry.id == active)
    }

    pub fn ignored_globs(&self) -> &[String] {
        self.ignored.globs()
    }

    /// Terminal resized; `rows` is the body height of either pane
    pub fn set_viewport(&mut self, rows: usize) {
        self.scroll.set_viewport(rows);
        self.detail_scroll.set_viewport(rows);
    }

    pub fn handle_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Status(status) => {
                self.status = status;
                if status == ConnectionStatus::Connected {
                    self.notice = None;
                }
            }
            StreamEvent::Message(message) => self.handle_message(message),
            StreamEvent::GaveUp => {
                self.notice = Some(format!("Gave up reconnecting to {}", self.server_url));
            }
        }
    }

    fn handle_message(&mut self, message: PushMessage) {
        match message {
            PushMessage::Connection { client_id, .. } => self.client_id = Some(client_id),
            PushMessage::Heartbeat { .. } => {}
            PushMessage::Shutdown { message, .. } => self.notice = Some(message),
            entry => {
                if let Some(event) = entry.into_entry() {
                    self.add_entry(event);
                }
            }
        }
    }

    fn add_entry(&mut self, event: wirepeek_common::EntryEvent) {
        let id = self.stream.push(event);
        let shown = self.stream.visible(&self.filter).count();
        let is_visible = self
            .stream
            .get(id)
            .is_some_and(|entry| self.filter.matches(entry));

        if is_visible {
            self.scroll.on_append(shown);
        } else {
            self.scroll.set_content_len(shown);
        }
    }

    /// Handle key events
    pub fn handle_key(&mut self, key: KeyEvent) {
        if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
            self.should_quit = true;
            return;
        }

        match (self.view, self.input_mode) {
            (View::List, InputMode::Filter) => self.handle_filter_key(key),
            (View::List, InputMode::Normal) => self.handle_list_key(key),
            (View::Detail, _) => self.handle_detail_key(key),
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.apply_filter_input();
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.filter_input.clear();
                self.apply_filter_input();
            }
            KeyCode::Backspace => {
                self.filter_input.pop();
                self.filter_debounce.touch(Instant::now());
            }
            KeyCode::Char(c) => {
                self.filter_input.push(c);
                self.filter_debounce.touch(Instant::now());
            }
            _ => {}
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        let page = self.scroll.viewport().max(1);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.input_mode = InputMode::Filter,
            KeyCode::Tab => {
                self.filter.kind = self.filter.kind.next();
                self.filter_changed();
            }
            KeyCode::Char('i') => self.ignore_selected(),
            KeyCode::Char('I') => self.clear_ignored(),
            KeyCode::Char('c') => {
                self.stream.clear();
                self.scroll.set_content_len(0);
            }
            KeyCode::Enter => self.open_selected(),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-(page as isize)),
            KeyCode::PageDown => self.move_selection(page as isize),
            KeyCode::Home => {
                self.select_row(0);
                self.scroll.to_top();
            }
            KeyCode::End => {
                let ids = self.visible_ids();
                if let Some(last) = ids.len().checked_sub(1) {
                    self.select_row(last);
                }
                self.scroll.to_bottom();
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let page = self.detail_scroll.viewport().max(1);
        let Some(detail) = self.detail.as_mut() else {
            self.view = View::List;
            return;
        };

        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
                self.selection_debounce.cancel();
                self.detail = None;
                self.view = View::List;
                return;
            }
            KeyCode::Left => detail.move_caret(CaretMove::Left),
            KeyCode::Right => detail.move_caret(CaretMove::Right),
            KeyCode::Up => detail.move_caret(CaretMove::Up),
            KeyCode::Down => detail.move_caret(CaretMove::Down),
            KeyCode::PageUp => detail.move_caret(CaretMove::PageUp(page)),
            KeyCode::PageDown => detail.move_caret(CaretMove::PageDown(page)),
            KeyCode::Home => detail.move_caret(CaretMove::LineStart),
            KeyCode::End => detail.move_caret(CaretMove::LineEnd),
            KeyCode::Char('v') => {
                if detail.toggle_anchor() {
                    self.selection_debounce.touch(Instant::now());
                }
            }
            KeyCode::Enter | KeyCode::Char('a') => {
                if self.selection_debounce.is_pending() {
                    self.selection_debounce.cancel();
                    detail.settle_selection();
                }
                detail.apply_pending();
            }
            KeyCode::Char('u') => detail.undo(),
            KeyCode::Char('r') => detail.redo(),
            KeyCode::Char('s') => {
                detail.toggle_auto_snap();
                self.auto_snap = detail.auto_snap();
            }
            KeyCode::Char('f') => {
                self.filter_input = detail.filter_text();
                self.apply_filter_input();
                self.selection_debounce.cancel();
                self.detail = None;
                self.view = View::List;
                return;
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let n = c.to_digit(10).unwrap_or(0) as usize;
                detail.go_to(n.checked_sub(1));
            }
            _ => {}
        }

        self.detail_scroll.set_content_len(detail.surface().line_count());
        self.detail_scroll.ensure_visible(detail.caret().line);
    }

    /// Handle TUI event
    pub fn handle_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Stream(event) => self.handle_stream(event),
            TuiEvent::Key(key) => self.handle_key(key),
            TuiEvent::Tick => self.on_tick(Instant::now()),
        }
    }

    /// Apply the filter box and snap released selections once input has paused
    pub fn on_tick(&mut self, now: Instant) {
        if self.filter_debounce.ready(now) {
            self.filter.text = self.filter_input.clone();
            self.filter_changed();
        }
        if self.selection_debounce.ready(now) {
            if let Some(detail) = self.detail.as_mut() {
                detail.settle_selection();
            }
        }
    }

    fn apply_filter_input(&mut self) {
        self.filter_debounce.cancel();
        self.filter.text = self.filter_input.clone();
        self.filter_changed();
    }

    fn filter_changed(&mut self) {
        let shown = self.stream.visible(&self.filter).count();
        self.scroll.set_content_len(shown);
        if let Some(row) = self.selected_row() {
            self.scroll.ensure_visible(row);
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let count = self.stream.visible(&self.filter).count();
        if count == 0 {
            return;
        }
        let row = match self.selected_row() {
            Some(row) => row.saturating_add_signed(delta).min(count - 1),
            None if delta < 0 => count - 1,
            None => 0,
        };
        self.select_row(row);
    }

    fn select_row(&mut self, row: usize) {
        let id = self.stream.visible(&self.filter).nth(row).map(|entry| entry.id);
        if id.is_some() {
            self.stream.set_active(id);
            self.scroll.ensure_visible(row);
        }
    }

    fn open_selected(&mut self) {
        if let Some(entry) = self.stream.active_entry() {
            let detail = DetailView::open(entry, self.auto_snap);
            self.selection_debounce.cancel();
            self.detail_scroll = AutoScroll::new(0);
            self.detail_scroll.set_viewport(self.scroll.viewport());
            self.detail_scroll.set_content_len(detail.surface().line_count());
            self.detail = Some(detail);
            self.view = View::Detail;
        }
    }

    /// Ignore the highlighted entry's exact url
    fn ignore_selected(&mut self) {
        let Some(url) = self
            .stream
            .active_entry()
            .and_then(|entry| entry.event.data.url())
            .map(str::to_string)
        else {
            return;
        };

        if self.ignored.add(&url) {
            self.notice = Some(format!("Ignoring {}", url));
            self.ignored_changed();
        }
    }

    fn clear_ignored(&mut self) {
        if self.ignored.is_empty() {
            return;
        }
        self.ignored.clear();
        self.notice = Some("Cleared ignored paths".to_string());
        self.ignored_changed();
    }

    fn ignored_changed(&mut self) {
        self.filter.ignored_globs = self.ignored.globs().to_vec();
        self.filter_changed();

        if let Some(path) = &self.ignored_file {
            if let Err(e) = self.ignored.save_to(path) {
                tracing::warn!("Failed to save ignored paths: {:#}", e);
                self.notice = Some("Failed to save ignored paths".to_string());
            }
        }
    }
}
