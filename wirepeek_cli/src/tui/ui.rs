//! TUI rendering functions

use super::app::{InputMode, TuiApp, View};
use crate::stream::ConnectionStatus;
use crate::viewer::detail::DetailView;
use crate::viewer::StoredEntry;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table,
    },
    Frame,
};
use wirepeek_common::CaptureEntry;

/// Rows taken by the header and footer lines
const CHROME_ROWS: u16 = 3;

/// Body rows of the list and detail panes for a terminal height
///
/// Both panes lose their borders plus one row: the table header or the
/// breadcrumb trail.
pub fn body_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS + 3) as usize
}

/// Draw the TUI
pub fn draw(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Status header
            Constraint::Min(3),    // Entries or detail
            Constraint::Length(1), // Footer
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    match (app.view, app.detail.as_ref()) {
        (View::Detail, Some(detail)) => draw_detail(frame, app, detail, chunks[1]),
        _ => draw_entries(frame, app, chunks[1]),
    }
    draw_footer(frame, app, chunks[2]);
}

fn draw_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let status_color = match app.status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => Color::Yellow,
        ConnectionStatus::Disconnected => Color::Red,
    };

    let shown = app.stream.visible(&app.filter).count();
    let mut first = vec![
        Span::styled(
            " WIREPEEK ",
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(app.status.as_str(), Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled("  ", Style::default()),
        Span::styled(
            truncate_str(&app.server_url, 40),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("  {}/{} of {}", shown, app.stream.len(), app.stream.capacity()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if let Some(notice) = &app.notice {
        first.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Yellow),
        ));
    }

    let filter_style = if app.input_mode == InputMode::Filter {
        Style::default().fg(Color::White).add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::White)
    };
    let filter_text = if app.input_mode == InputMode::Filter {
        format!("{}▏", app.filter_input)
    } else {
        app.filter.text.clone()
    };

    let second = Line::from(vec![
        Span::styled(" Kind ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.filter.kind.to_string(), Style::default().fg(Color::Magenta)),
        Span::styled("  Filter ", Style::default().fg(Color::DarkGray)),
        Span::styled(filter_text, filter_style),
        Span::styled("  Ignored ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.ignored_globs().len().to_string(),
            Style::default().fg(Color::White),
        ),
        Span::styled("  Snap ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            if app.auto_snap { "on" } else { "off" },
            Style::default().fg(Color::White),
        ),
    ]);

    frame.render_widget(Paragraph::new(vec![Line::from(first), second]), area);
}

/// Draw the visible entries with scrolling and scrollbar
fn draw_entries(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let visible: Vec<&StoredEntry> = app.stream.visible(&app.filter).collect();
    let offset = app.scroll.offset();
    let rows_shown = app.scroll.viewport().max(1);
    let active = app.stream.active();

    let header = Row::new(vec!["Time", "", "Kind", "Summary"])
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .bottom_margin(0);

    let summary_width = (area.width as usize).saturating_sub(9 + 3 + 10 + 8).max(10);

    let rows: Vec<Row> = visible
        .iter()
        .skip(offset)
        .take(rows_shown)
        .map(|entry| {
            let row_style = if Some(entry.id) == active {
                Style::default().bg(Color::Rgb(40, 40, 60))
            } else {
                Style::default()
            };

            Row::new(vec![
                Cell::from(format_timestamp(&entry.event.timestamp)),
                Cell::from(entry.event.icon.clone()),
                Cell::from(entry.event.data.entry_type().as_str()).style(kind_style(&entry.event.data)),
                Cell::from(truncate_str(&entry.event.message, summary_width)),
            ])
            .style(row_style)
        })
        .collect();

    // Split area to leave room for scrollbar
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(" Entries ({}) ", visible.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(table, chunks[0]);

    if !visible.is_empty() {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");

        let mut scrollbar_state = ScrollbarState::new(visible.len().saturating_sub(rows_shown))
            .position(offset);

        frame.render_stateful_widget(scrollbar, chunks[1], &mut scrollbar_state);
    }
}

fn draw_detail(frame: &mut Frame, app: &TuiApp, detail: &DetailView, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", truncate_str(&detail.title, area.width as usize / 2)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    // Breadcrumbs
    let mut crumbs = Vec::new();
    for (n, info) in detail.history_info().iter().enumerate() {
        if n > 0 {
            crumbs.push(Span::styled(" › ", Style::default().fg(Color::DarkGray)));
        }
        let style = if info.is_current {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        crumbs.push(Span::styled(format!("{}:{}", n, info.label), style));
    }
    frame.render_widget(Paragraph::new(Line::from(crumbs)), chunks[0]);

    // Text with caret, live selection and pending candidate
    let surface = detail.surface();
    let caret = surface.to_offset(detail.caret());
    let live = detail.live_selection();
    let pending = detail.pending();
    let offset = app.detail_scroll.offset();

    let mut start = 0;
    let mut lines = Vec::new();
    for (n, text) in detail.current_text().split('\n').enumerate() {
        let len = text.chars().count();
        if n >= offset && lines.len() < chunks[1].height as usize {
            lines.push(styled_line(text, start, caret, live, pending));
        }
        start += len + 1;
    }
    frame.render_widget(Paragraph::new(lines), chunks[1]);
}

/// Style one rendered line char by char, merging equal runs
fn styled_line(
    text: &str,
    line_start: usize,
    caret: Option<usize>,
    live: Option<(usize, usize)>,
    pending: Option<(usize, usize)>,
) -> Line<'static> {
    let within = |range: Option<(usize, usize)>, offset: usize| {
        range.is_some_and(|(start, end)| offset >= start && offset < end)
    };
    let style_at = |offset: usize| {
        if caret == Some(offset) {
            Style::default().add_modifier(Modifier::REVERSED)
        } else if within(live, offset) {
            Style::default().bg(Color::Rgb(60, 60, 90))
        } else if within(pending, offset) {
            Style::default().bg(Color::Rgb(30, 70, 40))
        } else {
            Style::default()
        }
    };

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_style = Style::default();

    for (i, ch) in text.chars().enumerate() {
        let style = style_at(line_start + i);
        if style != run_style && !run.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut run), run_style));
        }
        run_style = style;
        run.push(ch);
    }
    if !run.is_empty() {
        spans.push(Span::styled(run, run_style));
    }

    // Caret at the end of the line sits on the newline
    if caret == Some(line_start + text.chars().count()) {
        spans.push(Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)));
    }

    Line::from(spans)
}

/// Draw the footer with key hints
fn draw_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let hints: &[(&str, &str)] = match (app.view, app.input_mode) {
        (View::List, InputMode::Filter) => &[("Enter", "Apply"), ("Esc", "Clear")],
        (View::List, InputMode::Normal) => &[
            ("↑/↓", "Navigate"),
            ("Enter", "Inspect"),
            ("/", "Filter"),
            ("Tab", "Kind"),
            ("i", "Ignore path"),
            ("I", "Clear ignored"),
            ("c", "Clear"),
            ("q", "Quit"),
        ],
        (View::Detail, _) => &[
            ("Esc", "Back"),
            ("v", "Select"),
            ("Enter", "Apply"),
            ("u/r", "Undo/Redo"),
            ("0-9", "Jump"),
            ("s", "Snap"),
            ("f", "Filter by text"),
        ],
    };

    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(format!(" {}  ", label), Style::default().fg(Color::DarkGray)));
    }

    if let Some(pending) = app.detail.as_ref().and_then(|d| d.pending_text()) {
        if app.view == View::Detail {
            spans.push(Span::styled(
                format!("Pending: {}", truncate_str(&pending.replace('\n', " "), 40)),
                Style::default().fg(Color::Green),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn kind_style(entry: &CaptureEntry) -> Style {
    match entry {
        CaptureEntry::Request(log) => method_style(&log.method),
        CaptureEntry::Response(log) => status_style(log.status_code),
        CaptureEntry::Websocket(_) => Style::default().fg(Color::Magenta),
        CaptureEntry::Error(_) => Style::default().fg(Color::Red),
    }
}

/// Get style for HTTP method
fn method_style(method: &str) -> Style {
    match method {
        "GET" => Style::default().fg(Color::Green),
        "POST" => Style::default().fg(Color::Yellow),
        "PUT" => Style::default().fg(Color::Blue),
        "PATCH" => Style::default().fg(Color::Magenta),
        "DELETE" => Style::default().fg(Color::Red),
        "HEAD" => Style::default().fg(Color::Cyan),
        _ => Style::default().fg(Color::White),
    }
}

/// Get style for HTTP status code
fn status_style(status: u16) -> Style {
    if status >= 500 {
        Style::default().fg(Color::Red)
    } else if status >= 400 {
        Style::default().fg(Color::Yellow)
    } else if status >= 300 {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Green)
    }
}

/// Format timestamp for display
fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string()
}

/// Truncate to `max_len` chars
pub fn truncate_str(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_is_char_safe() {
        assert_eq!(truncate_str("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("abcdef", 2), "ab");
    }

    #[test]
    fn test_styled_line_runs() {
        let line = styled_line("abcdef", 10, Some(12), None, Some((13, 15)));
        let texts: Vec<String> = line.spans.iter().map(|s| s.content.to_string()).collect();
        assert_eq!(texts, vec!["ab", "c", "de", "f"]);
    }

    #[test]
    fn test_styled_line_caret_at_end() {
        let line = styled_line("ab", 0, Some(2), None, None);
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[1].content, " ");
    }

    #[test]
    fn test_body_rows() {
        assert_eq!(body_rows(24), 18);
        assert_eq!(body_rows(2), 0);
    }
}
