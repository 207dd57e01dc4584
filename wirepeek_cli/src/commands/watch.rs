//! Interactive viewer

use crate::config::{ignored_paths_file, Config, IgnoredPaths};
use crate::stream::{StreamClient, StreamEvent};
use crate::tui::{self, TuiApp, TuiEvent, ViewerOptions};
use crate::viewer::KindFilter;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct WatchOptions {
    pub url: Option<String>,
    pub kind: KindFilter,
}

pub async fn run(opts: WatchOptions) -> Result<()> {
    let config = Config::load()?;
    let server_url = config.server_url_or(opts.url);
    let ignored = IgnoredPaths::load()?;

    let client = StreamClient::new(&server_url)?;
    tracing::info!("Watching {}", client.url());

    let (stream_tx, mut stream_rx) = mpsc::channel::<StreamEvent>(256);
    let stream_task = tokio::spawn(client.run(stream_tx));

    let mut app = TuiApp::new(ViewerOptions {
        server_url,
        buffer_capacity: config.buffer_capacity,
        auto_snap: config.auto_snap,
        kind: opts.kind,
        ignored,
        ignored_file: Some(ignored_paths_file()),
    });

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &mut stream_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    stream_task.abort();

    if app.auto_snap != config.auto_snap {
        let mut config = config;
        config.auto_snap = app.auto_snap;
        if let Err(e) = config.save() {
            tracing::warn!("Failed to save config: {:#}", e);
        }
    }

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
    stream_rx: &mut mpsc::Receiver<StreamEvent>,
) -> Result<()> {
    let mut tick_interval = tokio::time::interval(Duration::from_millis(50));

    loop {
        let size = terminal.size()?;
        app.set_viewport(tui::body_rows(size.height));
        terminal.draw(|f| tui::draw(f, app))?;

        tokio::select! {
            // Handle keyboard events (non-blocking)
            _ = tick_interval.tick() => {
                while event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind == KeyEventKind::Press {
                            app.handle_event(TuiEvent::Key(key));
                        }
                    }
                }
                app.handle_event(TuiEvent::Tick);
                if app.should_quit {
                    return Ok(());
                }
            }

            Some(event) = stream_rx.recv() => {
                app.handle_event(TuiEvent::Stream(event));
            }
        }
    }
}
