//! File-based store — persistent JSON-lines record log.
//!
//! Each line is a JSON object tagged with `kind`: either a committed
//! `record`, or a `watermark` carrying the next id to assign. Appends add one
//! line and fsync. Retention deletes rewrite the whole file atomically with
//! the watermark first, so ids are never reused even after the newest
//! records are swept.
//!
//! Default location: `~/.recall/memories.jsonl`

use crate::atomic::atomic_write;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::error::StoreError;
use recall_core::memory::{MemoryRecord, NewRecord, RecordId, RecordStore};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogLine {
    Record(MemoryRecord),
    Watermark { next_id: RecordId },
}

/// A file-backed record store using JSONL (one JSON object per line).
///
/// The log is loaded into memory on open; reads never touch the disk.
pub struct FileStore {
    path: PathBuf,
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    records: Vec<MemoryRecord>,
    next_id: RecordId,
}

impl FileStore {
    /// Open (or lazily create) the log at `path`.
    ///
    /// Unparseable lines are skipped with a warning; a missing file is an
    /// empty store. Any other read failure is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (records, next_id) = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = records.len(), next_id, "File store loaded");
        Ok(Self {
            path,
            inner: Arc::new(RwLock::new(Inner { records, next_id })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<(Vec<MemoryRecord>, RecordId), StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 1)),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let mut records = Vec::new();
        let mut next_id: RecordId = 1;
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogLine>(line) {
                Ok(LogLine::Record(record)) => {
                    next_id = next_id.max(record.id + 1);
                    records.push(record);
                }
                Ok(LogLine::Watermark { next_id: mark }) => next_id = next_id.max(mark),
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "Skipping corrupted record line");
                }
            }
        }
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Ok((records, next_id))
    }

    fn encode(line: &LogLine) -> Result<String, StoreError> {
        serde_json::to_string(line)
            .map_err(|e| StoreError::Io(format!("Failed to serialize record: {e}")))
    }

    fn append_line(&self, line: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("Failed to create store directory: {e}")))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Io(format!("Failed to open {}: {e}", self.path.display())))?;
        let len = file
            .metadata()
            .map_err(|e| StoreError::Io(format!("Failed to stat {}: {e}", self.path.display())))?
            .len();

        let mut buf = Vec::with_capacity(line.len() + 2);
        // A torn tail from an earlier crash must not swallow this line.
        if len > 0 && !ends_with_newline(&mut file, len) {
            buf.push(b'\n');
        }
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        if let Err(e) = file.write_all(&buf).and_then(|_| file.sync_data()) {
            if let Err(truncate) = file.set_len(len) {
                warn!(error = %truncate, "Failed to roll back partial append");
            }
            return Err(StoreError::Io(format!("Failed to append record: {e}")));
        }
        Ok(())
    }

    fn rewrite(&self, inner: &Inner) -> Result<(), StoreError> {
        let mut content = Self::encode(&LogLine::Watermark {
            next_id: inner.next_id,
        })?;
        content.push('\n');
        for record in &inner.records {
            content.push_str(&Self::encode(&LogLine::Record(record.clone()))?);
            content.push('\n');
        }
        atomic_write(&self.path, content.as_bytes())
            .map_err(|e| StoreError::Io(format!("Failed to rewrite record log: {e}")))
    }
}

fn ends_with_newline(file: &mut std::fs::File, len: u64) -> bool {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))
        .and_then(|_| file.read_exact(&mut last))
        .map(|_| last[0] == b'\n')
        .unwrap_or(false)
}

#[async_trait]
impl RecordStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(&self, record: NewRecord) -> Result<MemoryRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let record = record.commit(inner.next_id);
        // A failed append burns its id: bytes that reached the disk are
        // never shadowed by a later record with the same id.
        inner.next_id = record.id + 1;
        let line = Self::encode(&LogLine::Record(record.clone()))?;
        self.append_line(&line)?;

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
        let (expired, kept): (Vec<_>, Vec<_>) = inner
            .records
            .iter()
            .cloned()
            .partition(|r| r.timestamp < cutoff);
        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let next = Inner {
            records: kept,
            next_id: inner.next_id,
        };
        // Disk first: on failure the in-memory view still matches the file.
        self.rewrite(&next)?;
        *inner = next;

        Ok(expired.into_iter().map(|r| r.id).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.records.len())
    }
}
