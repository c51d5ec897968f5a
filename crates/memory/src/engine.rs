//! The memory engine: one explicit instance owning the record store, the
//! embedding chain, and the derived vector index.
//!
//! Write discipline: every mutation holds `writer` for its whole duration,
//! and mutations that touch indexed data also hold the index write lock
//! across the store commit and the index update. Searches hold the index
//! read lock while they run, so they observe either the state before a
//! save or the state after it, never a committed record without its index
//! entry.

use crate::index::VectorIndex;
use crate::search::{SearchPath, SimilaritySearch};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use recall_core::error::Result;
use recall_core::memory::{MemoryRecord, NewRecord, RecordId, RecordStore, SearchHit};
use recall_embeddings::EmbeddingChain;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default number of session entries loaded for context assembly.
pub const DEFAULT_SESSION_LIMIT: usize = 200;

/// Nearest hits checked for an identical text by [`MemoryEngine::learn_unique`].
const DUPLICATE_SCAN: usize = 5;

/// Source tag used by [`MemoryEngine::learn`].
pub const LEARN_SOURCE: &str = "context";

/// Index behavior for a [`MemoryEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Keep an in-memory vector index. When off, every search brute-forces.
    pub index_enabled: bool,
    /// Where the index snapshot lives. `None` keeps the index in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            index_enabled: true,
            snapshot_path: None,
        }
    }
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub backend: String,
    pub records: usize,
    pub indexed: usize,
    pub dimension: Option<usize>,
    pub search_path: String,
    pub embedding_stages: Vec<String>,
}

pub struct MemoryEngine {
    store: Arc<dyn RecordStore>,
    embedder: Arc<EmbeddingChain>,
    index: RwLock<Option<VectorIndex>>,
    writer: Mutex<()>,
    dirty: AtomicBool,
    options: EngineOptions,
}

impl MemoryEngine {
    /// Wire up an engine and bring its index up to date with the store.
    ///
    /// A snapshot is used only if it matches the store exactly; a missing,
    /// unreadable or stale snapshot is replaced by a rebuild.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        embedder: Arc<EmbeddingChain>,
        options: EngineOptions,
    ) -> Result<Self> {
        let engine = Self {
            store,
            embedder,
            index: RwLock::new(None),
            writer: Mutex::new(()),
            dirty: AtomicBool::new(false),
            options,
        };

        if engine.options.index_enabled {
            let records = engine.store.embedded().await?;
            let index = engine.load_or_build(&records);
            *engine.index.write().await = index;
        }

        info!(
            backend = engine.store.name(),
            index = engine.options.index_enabled,
            "Memory engine ready"
        );
        Ok(engine)
    }

    fn load_or_build(&self, records: &[MemoryRecord]) -> Option<VectorIndex> {
        if let Some(path) = &self.options.snapshot_path {
            match VectorIndex::load_snapshot(path) {
                Ok(index) if index.matches(records) => {
                    info!(path = %path.display(), entries = index.len(), "Loaded index snapshot");
                    return (!index.is_empty()).then_some(index);
                }
                Ok(index) => {
                    warn!(
                        path = %path.display(),
                        snapshot_entries = index.len(),
                        "Index snapshot is stale; rebuilding from store"
                    );
                }
                Err(e) if path.exists() => {
                    warn!(error = %e, "Index snapshot unusable; rebuilding from store");
                }
                Err(_) => {
                    debug!(path = %path.display(), "No index snapshot; building from store");
                }
            }
        }

        let index = VectorIndex::build(records);
        self.dirty.store(true, Ordering::SeqCst);
        index
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<EmbeddingChain> {
        &self.embedder
    }

    /// Embed and commit `text`. Blank text is a no-op and yields `None`.
    ///
    /// Store failures surface to the caller and leave the index untouched.
    pub async fn save(
        &self,
        text: &str,
        source: &str,
        tags: &[String],
    ) -> Result<Option<RecordId>> {
        if text.trim().is_empty() {
            debug!(source, "Ignoring save of blank text");
            return Ok(None);
        }

        let embedding = self.embedder.embed_one(text).await;
        let record = NewRecord::new(text, source)
            .with_tags(tags.iter().cloned())
            .with_embedding(embedding);

        let _writer = self.writer.lock().await;
        let mut index = self.index.write().await;
        let record = self.store.append(record).await?;

        if self.options.index_enabled {
            if let Some(vector) = record.embedding.clone() {
                self.index_vector(&mut index, record.id, vector);
            }
        }

        debug!(id = record.id, source, "Saved memory");
        Ok(Some(record.id))
    }

    fn index_vector(&self, index: &mut Option<VectorIndex>, id: RecordId, vector: Vec<f32>) {
        let index = index.get_or_insert_with(|| {
            info!(dimension = vector.len(), "Establishing vector index dimension");
            VectorIndex::new(vector.len())
        });
        match index.add(id, vector) {
            Ok(()) => self.dirty.store(true, Ordering::SeqCst),
            Err(e) => warn!(id, error = %e, "Record excluded from vector index"),
        }
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<MemoryRecord>> {
        let _index = self.index.read().await;
        Ok(self.store.get(id).await?)
    }

    /// Most recent records first.
    pub async fn list(&self, limit: usize) -> Result<Vec<MemoryRecord>> {
        let _index = self.index.read().await;
        Ok(self.store.list_recent(limit).await?)
    }

    /// Embed `query` and return at most `limit` hits, most similar first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(query).await;
        self.search_vector(&vector, limit).await
    }

    /// Rank stored records against an already-embedded query.
    pub async fn search_vector(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let index = self.index.read().await;
        let search = SimilaritySearch::new(self.store.as_ref(), index.as_ref());
        Ok(search.search(vector, limit).await?)
    }

    /// Delete records with `timestamp < cutoff` and drop their index entries.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _writer = self.writer.lock().await;
        let mut index = self.index.write().await;
        let removed = self.store.delete_older_than(cutoff).await?;

        if let Some(idx) = index.as_mut() {
            let mut dropped = 0usize;
            for id in &removed {
                if idx.remove(*id) {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                self.dirty.store(true, Ordering::SeqCst);
            }
            if idx.is_empty() {
                *index = None;
                self.dirty.store(true, Ordering::SeqCst);
            }
        }

        info!(removed = removed.len(), cutoff = %cutoff, "Deleted expired records");
        Ok(removed.len())
    }

    /// Retention sweep: delete everything older than `max_age`.
    pub async fn sweep(&self, max_age: ChronoDuration) -> Result<usize> {
        self.delete_older_than(Utc::now() - max_age).await
    }

    /// Append one conversation entry to a session log. Session entries are
    /// never embedded or indexed. Blank text yields `None`.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: &str,
        text: &str,
    ) -> Result<Option<RecordId>> {
        if text.trim().is_empty() {
            debug!(session_id, role, "Ignoring blank session entry");
            return Ok(None);
        }
        let record = NewRecord::new(text, session_id).with_session(session_id, role);

        let _writer = self.writer.lock().await;
        let record = self.store.append(record).await?;
        Ok(Some(record.id))
    }

    /// Session entries, newest first.
    pub async fn session_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>> {
        Ok(self.store.session(session_id, limit).await?)
    }

    /// Save `text` as learned context.
    pub async fn learn(&self, text: &str, tags: &[String]) -> Result<Option<RecordId>> {
        self.save(text, LEARN_SOURCE, tags).await
    }

    /// Save `text` unless one of the closest stored memories already has
    /// exactly this text, in which case that memory's id is returned.
    pub async fn learn_unique(
        &self,
        text: &str,
        source: &str,
        tags: &[String],
    ) -> Result<Option<RecordId>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        // Repeated-word texts ("rust rust") score 1.0 against "rust" too.
        let nearest = self.search(text, DUPLICATE_SCAN).await?;
        if let Some(hit) = nearest.iter().find(|h| h.record.text.trim() == text) {
            debug!(id = hit.record.id, "Skipping duplicate memory");
            return Ok(Some(hit.record.id));
        }
        self.save(text, source, tags).await
    }

    /// Replay the store into a fresh index. Returns the number of indexed
    /// records.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let _writer = self.writer.lock().await;
        let mut index = self.index.write().await;
        let records = self.store.embedded().await?;

        *index = if self.options.index_enabled {
            VectorIndex::build(&records)
        } else {
            None
        };
        self.dirty.store(true, Ordering::SeqCst);

        let indexed = index.as_ref().map_or(0, VectorIndex::len);
        info!(indexed, embedded = records.len(), "Vector index rebuilt");
        Ok(indexed)
    }

    /// Write the index snapshot if anything changed since the last write.
    /// Returns whether a write (or removal) happened.
    pub async fn persist_index(&self) -> Result<bool> {
        let Some(path) = &self.options.snapshot_path else {
            return Ok(false);
        };
        if !self.options.index_enabled || !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let index = self.index.read().await;
        let outcome: Result<()> = match index.as_ref() {
            Some(idx) => idx.save_snapshot(path).map_err(Into::into),
            None => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(recall_core::Error::Internal(format!(
                    "Failed to remove index snapshot: {e}"
                ))),
            },
        };

        if outcome.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        outcome.map(|_| true)
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let index = self.index.read().await;
        let records = self.store.count().await?;
        let search_path = match index.as_ref() {
            Some(idx) if !idx.is_empty() => SearchPath::Indexed,
            _ => SearchPath::BruteForce,
        };

        Ok(EngineStats {
            backend: self.store.name().to_string(),
            records,
            indexed: index.as_ref().map_or(0, VectorIndex::len),
            dimension: index.as_ref().map(VectorIndex::dimension),
            search_path: search_path.to_string(),
            embedding_stages: self
                .embedder
                .stage_names()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }
}
