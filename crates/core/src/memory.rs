//! Memory records and the record store trait.
//!
//! The record store is the single source of truth for the engine: every
//! vector index is derived from it and can be rebuilt by replaying it.
//! Records are append-only; the only removal path is the retention sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// Store-assigned record identifier. Strictly increasing, never reused.
pub type RecordId = u64;

/// A single committed memory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique, monotonically increasing ID
    pub id: RecordId,

    /// When the record was committed (UTC, serialized as ISO-8601)
    pub timestamp: DateTime<Utc>,

    /// Free-form origin tag ("system", "context", "log", a session id, ...)
    pub source: String,

    /// The text content
    pub text: String,

    /// Embedding vector, absent for session-log entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Ordered, duplicate-free tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Conversation session this record belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Speaker role for session-log entries ("user", "assistant", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl MemoryRecord {
    /// Dimension of the stored vector, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }
}

/// A record that has not been committed yet. The store assigns `id`.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub source: String,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub tags: Vec<String>,
    pub session_id: Option<String>,
    pub role: Option<String>,
    /// Explicit commit time; `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewRecord {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Attach tags, dropping duplicates while keeping first-seen order.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        self.tags = unique;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>, role: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.role = Some(role.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Materialize the committed record.
    pub fn commit(self, id: RecordId) -> MemoryRecord {
        MemoryRecord {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source,
            text: self.text,
            embedding: self.embedding,
            tags: self.tags,
            session_id: self.session_id,
            role: self.role,
        }
    }
}

/// A ranked search result. Produced transiently, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: MemoryRecord,
    /// Cosine similarity to the query, higher is better
    pub rank_score: f32,
}

/// The core RecordStore trait.
///
/// Implementations: SQLite, JSONL file, in-memory (for testing).
///
/// Callers serialize writes; implementations only need to make each single
/// call atomic.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "in_memory").
    fn name(&self) -> &str;

    /// Commit a new record and return it with its assigned id.
    async fn append(&self, record: NewRecord) -> std::result::Result<MemoryRecord, StoreError>;

    /// Get a record by id.
    async fn get(&self, id: RecordId) -> std::result::Result<Option<MemoryRecord>, StoreError>;

    /// Most recent records first, at most `limit`.
    async fn list_recent(&self, limit: usize) -> std::result::Result<Vec<MemoryRecord>, StoreError>;

    /// Every record that carries an embedding, in ascending id order.
    async fn embedded(&self) -> std::result::Result<Vec<MemoryRecord>, StoreError>;

    /// Records of one session, newest first, at most `limit`.
    async fn session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryRecord>, StoreError>;

    /// Remove records with `timestamp < cutoff`; returns the removed ids.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> std::result::Result<Vec<RecordId>, StoreError>;

    /// Total record count.
    async fn count(&self) -> std::result::Result<usize, StoreError>;
}
