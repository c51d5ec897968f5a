//! recall CLI — the main entry point.
//!
//! Commands:
//! - `init`                     — Write a default config file
//! - `save` / `get` / `list`    — Write and read memories
//! - `search` / `context`       — Semantic retrieval
//! - `session-context`          — Token-budgeted conversation history
//! - `sweep` / `rebuild-index`  — Maintenance
//! - `stats`                    — Engine status
//! - `daemon`                   — Periodic retention sweeps until Ctrl-C

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "recall",
    about = "recall — semantic memory and context assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config to ~/.recall/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Save a memory
    Save {
        text: String,

        /// Origin tag stored with the memory
        #[arg(short, long, default_value = "system")]
        source: String,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Show one memory by id
    Get { id: u64 },

    /// List the most recent memories
    List {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Rank memories by similarity to a query
    Search {
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Print hits as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the semantic context block for a query
    Context {
        query: String,

        /// Number of hits (defaults to context.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print raw hits as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Wrap the context in a ready-to-send prompt
        #[arg(long, conflicts_with = "json")]
        prompt: bool,
    },

    /// Trim conversation history to a token budget
    SessionContext {
        /// JSON array of {"role", "content"} entries, newest first
        #[arg(long, required_unless_present = "session", conflicts_with = "session")]
        file: Option<PathBuf>,

        /// Load the history of a stored session instead
        #[arg(long)]
        session: Option<String>,

        /// Token budget (defaults to context.token_budget)
        #[arg(short, long)]
        budget: Option<usize>,
    },

    /// Delete memories older than the retention window
    Sweep {
        /// Override retention.max_age_days
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Rebuild the vector index from the record store
    RebuildIndex,

    /// Show engine statistics
    Stats,

    /// Run retention sweeps periodically until Ctrl-C
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Save { text, source, tags } => commands::memory::save(&text, &source, &tags).await?,
        Commands::Get { id } => commands::memory::get(id).await?,
        Commands::List { limit } => commands::memory::list(limit).await?,
        Commands::Search { query, limit, json } => commands::memory::search(&query, limit, json).await?,
        Commands::Context {
            query,
            limit,
            json,
            prompt,
        } => commands::context::semantic(&query, limit, json, prompt).await?,
        Commands::SessionContext {
            file,
            session,
            budget,
        } => commands::context::session(file, session, budget).await?,
        Commands::Sweep { max_age_days } => commands::memory::sweep(max_age_days).await?,
        Commands::RebuildIndex => commands::memory::rebuild_index().await?,
        Commands::Stats => commands::memory::stats().await?,
        Commands::Daemon => commands::daemon::run().await?,
    }

    Ok(())
}
