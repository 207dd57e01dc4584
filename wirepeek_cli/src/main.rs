//! Wirepeek CLI - watch traffic captured by the inspecting proxy
//!
//! Usage:
//!   wirepeek watch               Interactive viewer
//!   wirepeek tail                One line per captured entry
//!   wirepeek ignore <ACTION>     Manage ignored path globs
//!   wirepeek status              Show inspector metrics

mod commands;
mod config;
mod stream;
mod tui;
mod viewer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use viewer::KindFilter;

#[derive(Parser)]
#[command(name = "wirepeek")]
#[command(author = "Wirepeek Team")]
#[command(version)]
#[command(about = "Watch HTTP and WebSocket traffic captured by the Wirepeek proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive viewer
    Watch {
        /// Inspector URL (defaults to the configured server_url)
        #[arg(short, long, env = "WIREPEEK_URL")]
        url: Option<String>,

        /// Entry kinds to show initially
        #[arg(short, long, value_enum, default_value_t = KindFilter::All)]
        kind: KindFilter,
    },

    /// Print captured entries as they arrive
    Tail {
        /// Inspector URL (defaults to the configured server_url)
        #[arg(short, long, env = "WIREPEEK_URL")]
        url: Option<String>,

        /// Entry kinds to print
        #[arg(short, long, value_enum, default_value_t = KindFilter::All)]
        kind: KindFilter,

        /// Only print entries containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Manage ignored path globs
    Ignore {
        #[command(subcommand)]
        action: IgnoreAction,
    },

    /// Show inspector metrics
    Status {
        /// Inspector URL (defaults to the configured server_url)
        #[arg(short, long, env = "WIREPEEK_URL")]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum IgnoreAction {
    /// Hide entries whose url matches a glob (`*` matches anything)
    Add { glob: String },
    /// Stop ignoring a glob
    Remove { glob: String },
    /// List ignored globs
    List,
    /// Remove every ignored glob
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure config directories exist
    config::ensure_dirs()?;

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},wirepeek_cli=info", log_level).into());

    if matches!(cli.command, Commands::Watch { .. }) {
        // The TUI owns the terminal, so logs go to a file
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(config::log_file())
            .context("Failed to open log file")?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(log_file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().without_time())
            .init();
    }

    // Handle commands
    match cli.command {
        Commands::Watch { url, kind } => {
            commands::watch::run(commands::watch::WatchOptions { url, kind }).await?;
        }

        Commands::Tail { url, kind, filter } => {
            let opts = commands::tail::TailOptions { url, kind, filter };
            commands::tail::run(opts).await?;
        }

        Commands::Ignore { action } => match action {
            IgnoreAction::Add { glob } => commands::ignore::add(&glob)?,
            IgnoreAction::Remove { glob } => commands::ignore::remove(&glob)?,
            IgnoreAction::List => commands::ignore::list()?,
            IgnoreAction::Clear => commands::ignore::clear()?,
        },

        Commands::Status { url } => {
            commands::status::run(url).await?;
        }
    }

    Ok(())
}
