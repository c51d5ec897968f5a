//! Subcommand implementations and the shared engine wiring.

pub mod context;
pub mod daemon;
pub mod init;
pub mod memory;

use recall_config::AppConfig;
use recall_core::memory::RecordStore;
use recall_memory::{EngineOptions, FileStore, InMemoryStore, MemoryEngine, SqliteStore};
use std::sync::Arc;
use tracing::debug;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the configured record store.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    let store: Arc<dyn RecordStore> = match config.store.backend.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        "file" => Arc::new(
            FileStore::open(config.store.resolved_path())
                .map_err(|e| format!("Failed to open memory log: {e}"))?,
        ),
        _ => Arc::new(
            SqliteStore::new(config.store.resolved_path())
                .await
                .map_err(|e| format!("Failed to open memory database: {e}"))?,
        ),
    };
    Ok(store)
}

/// Build the engine for `config`: store, embedding chain and index.
pub async fn open_engine(config: &AppConfig) -> Result<Arc<MemoryEngine>, Box<dyn std::error::Error>> {
    let store = open_store(config).await?;
    let embedder = Arc::new(recall_embeddings::build_chain(&config.embedding).await);

    // An in-memory store starts empty every run, so a snapshot would never match.
    let snapshot_path = (config.store.backend != "memory").then(|| config.index.resolved_snapshot_path());
    let options = EngineOptions {
        index_enabled: config.index.enabled,
        snapshot_path,
    };

    debug!(backend = store.name(), stages = ?embedder.stage_names(), "Opening memory engine");
    let engine = MemoryEngine::open(store, embedder, options).await?;
    Ok(Arc::new(engine))
}

/// Shorten `text` to `max` characters for one-line display.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
