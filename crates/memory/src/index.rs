//! In-memory vector index over embedded records.
//!
//! The index is a flat map from record id to vector, scanned linearly at
//! query time. It is a pure accelerator: everything it holds can be derived
//! from the record store, so a missing or stale snapshot is rebuilt rather
//! than trusted.

use crate::atomic::atomic_write;
use crate::vector::rank_candidates;
use recall_core::error::IndexError;
use recall_core::memory::{MemoryRecord, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

const SNAPSHOT_VERSION: u32 = 1;

/// Vectors of a single dimension, keyed by record id.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: BTreeMap<RecordId, Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    version: u32,
    dimension: usize,
    count: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    id: RecordId,
    vector: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: BTreeMap::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.vectors.contains_key(&id)
    }

    /// Insert a vector. Vectors of any other dimension are rejected.
    pub fn add(&mut self, id: RecordId, vector: Vec<f32>) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    pub fn remove(&mut self, id: RecordId) -> bool {
        self.vectors.remove(&id).is_some()
    }

    /// Top-`k` ids by cosine similarity. Empty when the query's dimension
    /// does not match the index.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(RecordId, f32)> {
        if query.len() != self.dimension {
            return Vec::new();
        }
        rank_candidates(
            self.vectors.iter().map(|(id, v)| (*id, v.as_slice())),
            query,
            k,
        )
    }

    /// Pick the index dimension for a set of embedded records: the most
    /// common vector length, ties going to the dimension of the newest
    /// record among the tied ones.
    pub fn choose_dimension(records: &[MemoryRecord]) -> Option<usize> {
        // dimension -> (count, newest id with that dimension)
        let mut tally: HashMap<usize, (usize, RecordId)> = HashMap::new();
        for record in records {
            if let Some(dim) = record.dimension().filter(|d| *d > 0) {
                let entry = tally.entry(dim).or_insert((0, record.id));
                entry.0 += 1;
                entry.1 = entry.1.max(record.id);
            }
        }
        tally
            .into_iter()
            .max_by_key(|(_, (count, newest))| (*count, *newest))
            .map(|(dim, _)| dim)
    }

    /// Build from records. `None` when no record carries a usable vector.
    /// Records whose dimension differs from the chosen one are skipped.
    pub fn build(records: &[MemoryRecord]) -> Option<Self> {
        let dimension = Self::choose_dimension(records)?;
        let mut index = Self::new(dimension);
        let mut skipped = 0usize;

        for record in records {
            match &record.embedding {
                Some(v) if v.len() == dimension => {
                    index.vectors.insert(record.id, v.clone());
                }
                Some(_) => skipped += 1,
                None => {}
            }
        }

        if skipped > 0 {
            warn!(
                dimension,
                skipped, "Index build: skipped records with a different embedding dimension"
            );
        }
        debug!(dimension, entries = index.len(), "Vector index built");
        Some(index)
    }

    /// Whether this index holds exactly the eligible vectors of `records`.
    pub fn matches(&self, records: &[MemoryRecord]) -> bool {
        let mut eligible = 0usize;
        for record in records {
            if let Some(v) = &record.embedding {
                if v.len() != self.dimension {
                    continue;
                }
                eligible += 1;
                if !self.contains(record.id) {
                    return false;
                }
            }
        }
        eligible == self.vectors.len()
    }

    /// Write the index to `path` atomically.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), IndexError> {
        let snapshot = IndexSnapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            count: self.vectors.len(),
            entries: self
                .vectors
                .iter()
                .map(|(id, vector)| SnapshotEntry {
                    id: *id,
                    vector: vector.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| IndexError::Snapshot(format!("serialize: {e}")))?;
        atomic_write(path, &json)
            .map_err(|e| IndexError::Snapshot(format!("write {}: {e}", path.display())))?;
        debug!(path = %path.display(), entries = snapshot.count, "Index snapshot saved");
        Ok(())
    }

    /// Read a snapshot. The result is structurally valid but may still be
    /// stale; check it with [`matches`](Self::matches) before use.
    pub fn load_snapshot(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path)
            .map_err(|e| IndexError::Snapshot(format!("read {}: {e}", path.display())))?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::Snapshot(format!("parse {}: {e}", path.display())))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(IndexError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.dimension == 0 {
            return Err(IndexError::Snapshot("snapshot dimension is zero".into()));
        }
        if snapshot.count != snapshot.entries.len() {
            return Err(IndexError::Snapshot(format!(
                "snapshot declares {} entries but holds {}",
                snapshot.count,
                snapshot.entries.len()
            )));
        }

        let mut index = Self::new(snapshot.dimension);
        for entry in snapshot.entries {
            index.add(entry.id, entry.vector)?;
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::memory::NewRecord;
    use tempfile::tempdir;

    fn record(id: RecordId, embedding: Option<Vec<f32>>) -> MemoryRecord {
        let mut new = NewRecord::new(format!("record {id}"), "system");
        new.embedding = embedding;
        new.commit(id)
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = VectorIndex::new(3);
        index.add(1, vec![1.0, 0.0, 0.0]).unwrap();
        let err = index.add(2, vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn search_ranks_and_ignores_foreign_dimension() {
        let mut index = VectorIndex::new(2);
        index.add(1, vec![1.0, 0.0]).unwrap();
        index.add(2, vec![0.0, 1.0]).unwrap();
        index.add(3, vec![0.7, 0.7]).unwrap();

        let hits = index.search(&[1.0, 0.0], 2);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 3]);
        assert!(index.search(&[1.0, 0.0, 0.0], 2).is_empty());
    }

    #[test]
    fn remove_entry() {
        let mut index = VectorIndex::new(1);
        index.add(5, vec![1.0]).unwrap();
        assert!(index.contains(5));
        assert!(index.remove(5));
        assert!(!index.remove(5));
        assert!(index.is_empty());
    }

    #[test]
    fn build_uses_majority_dimension() {
        let records = vec![
            record(1, Some(vec![1.0, 0.0])),
            record(2, Some(vec![1.0, 0.0, 0.0])),
            record(3, Some(vec![0.0, 1.0])),
            record(4, None),
        ];
        let index = VectorIndex::build(&records).unwrap();
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.len(), 2);
        assert!(!index.contains(2));
    }

    #[test]
    fn dimension_tie_goes_to_newest() {
        let records = vec![
            record(1, Some(vec![1.0, 0.0])),
            record(2, Some(vec![1.0, 0.0, 0.0])),
        ];
        assert_eq!(VectorIndex::choose_dimension(&records), Some(3));
    }

    #[test]
    fn build_without_vectors_is_none() {
        assert!(VectorIndex::build(&[record(1, None)]).is_none());
        assert!(VectorIndex::build(&[]).is_none());
    }

    #[test]
    fn snapshot_round_trip_and_validation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.index.json");
        let records = vec![record(1, Some(vec![1.0, 0.0])), record(2, Some(vec![0.0, 1.0]))];

        let index = VectorIndex::build(&records).unwrap();
        index.save_snapshot(&path).unwrap();

        let loaded = VectorIndex::load_snapshot(&path).unwrap();
        assert_eq!(loaded.dimension(), 2);
        assert!(loaded.matches(&records));

        let mut more = records.clone();
        more.push(record(3, Some(vec![0.5, 0.5])));
        assert!(!loaded.matches(&more));
        assert!(!loaded.matches(&records[..1]));
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.index.json");

        std::fs::write(&path, b"{not json").unwrap();
        assert!(VectorIndex::load_snapshot(&path).is_err());

        std::fs::write(
            &path,
            br#"{"version":1,"dimension":2,"count":2,"entries":[{"id":1,"vector":[1.0,0.0]}]}"#,
        )
        .unwrap();
        assert!(VectorIndex::load_snapshot(&path).is_err());

        std::fs::write(
            &path,
            br#"{"version":1,"dimension":2,"count":1,"entries":[{"id":1,"vector":[1.0]}]}"#,
        )
        .unwrap();
        assert!(VectorIndex::load_snapshot(&path).is_err());
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(VectorIndex::load_snapshot(&dir.path().join("absent.json")).is_err());
    }
}
