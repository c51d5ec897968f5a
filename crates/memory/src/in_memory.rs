//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::error::StoreError;
use recall_core::memory::{MemoryRecord, NewRecord, RecordId, RecordStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store that keeps records in a Vec, ordered by id.
/// Nothing survives the process.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: Vec<MemoryRecord>,
    next_id: RecordId,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                records: Vec::new(),
                next_id: 1,
            })),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, record: NewRecord) -> Result<MemoryRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = record.commit(inner.next_id);
        inner.next_id += 1;
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<MemoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| inner.records[i].clone()))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().rev().take(limit).cloned().collect())
    }

    async fn embedded(&self) -> Result<Vec<MemoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.embedding.is_some())
            .cloned()
            .collect())
    }

    async fn session(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|r| r.session_id.as_deref() == Some(session_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecordId>, StoreError> {
        let mut inner = self.inner.write().await;
        let mut removed = Vec::new();
        inner.records.retain(|r| {
            if r.timestamp < cutoff {
                removed.push(r.id);
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.records.len())
    }
}
