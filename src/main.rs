//! # Mishkat CLI (`mishkat`)
//!
//! ## Usage
//!
//! ```bash
//! mishkat --config ./config/mishkat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mishkat sources` | List source directories and matching file counts |
//! | `mishkat ingest` | Extract, chunk, embed, and upsert documents |
//! | `mishkat stats` | Show the index vector count |
//! | `mishkat ask "<question>"` | Stream one answer to stdout |
//! | `mishkat chat` | Interactive session with history |
//! | `mishkat serve` | Start the HTTP chat server |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `mishkat=info,mishkat_core=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mishkat::config::load_config;
use mishkat::progress::ProgressMode;
use mishkat::{chat, ingest, server, sources, stats};

/// Mishkat — multilingual question answering over an indexed corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mishkat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mishkat",
    about = "Mishkat — multilingual retrieval-augmented chat over Islamic texts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mishkat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured source directories and their status.
    Sources,

    /// Ingest documents from the source directories into the index.
    ///
    /// Documents are processed in batches. A file that cannot be extracted
    /// is skipped; a batch that fails to embed or upsert is skipped; the
    /// run continues either way.
    Ingest {
        /// Override `[ingest].directories` (repeatable).
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        /// Extract and chunk only; do not embed or write to the index.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show index statistics.
    Stats,

    /// Ask a single question and stream the answer.
    Ask {
        /// The question, in English, Arabic, or Urdu.
        question: String,

        /// Print retrieved sources after the answer.
        #[arg(long)]
        show_sources: bool,
    },

    /// Start an interactive chat session on stdin.
    Chat,

    /// Start the HTTP chat server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mishkat=info,mishkat_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Sources => sources::list_sources(&config)?,
        Commands::Ingest {
            dirs,
            dry_run,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&config, dirs, dry_run, mode).await?;
        }
        Commands::Stats => stats::run_stats(&config).await?,
        Commands::Ask {
            question,
            show_sources,
        } => chat::run_ask(&config, &question, show_sources).await?,
        Commands::Chat => chat::run_chat(&config).await?,
        Commands::Serve => server::run_server(&config).await?,
    }

    Ok(())
}
