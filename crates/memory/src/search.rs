//! Similarity search over the record store, with or without an index.
//!
//! The indexed path ranks against [`VectorIndex`] and then loads the winning
//! records; the brute-force path scans every embedded record. Both rank
//! through [`rank_candidates`], so results are interchangeable.

use crate::index::VectorIndex;
use crate::vector::rank_candidates;
use recall_core::error::StoreError;
use recall_core::memory::{RecordStore, SearchHit};
use std::fmt;
use tracing::{debug, warn};

/// Which execution path served (or would serve) a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    Indexed,
    BruteForce,
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPath::Indexed => write!(f, "indexed"),
            SearchPath::BruteForce => write!(f, "brute_force"),
        }
    }
}

/// One search against a store and an optional index.
pub struct SimilaritySearch<'a> {
    store: &'a dyn RecordStore,
    index: Option<&'a VectorIndex>,
}

impl<'a> SimilaritySearch<'a> {
    pub fn new(store: &'a dyn RecordStore, index: Option<&'a VectorIndex>) -> Self {
        Self { store, index }
    }

    /// The path a query of this dimension takes.
    pub fn path_for(&self, query_dimension: usize) -> SearchPath {
        match self.index {
            Some(index) if !index.is_empty() && index.dimension() == query_dimension => {
                SearchPath::Indexed
            }
            _ => SearchPath::BruteForce,
        }
    }

    /// Top-`k` hits for `query`, most similar first.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }
        match self.path_for(query.len()) {
            SearchPath::Indexed => self.search_indexed(query, k).await,
            SearchPath::BruteForce => self.search_brute_force(query, k).await,
        }
    }

    async fn search_indexed(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let Some(index) = self.index else {
            return self.search_brute_force(query, k).await;
        };

        let ranked = index.search(query, k);
        let mut hits = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            match self.store.get(id).await? {
                Some(record) => hits.push(SearchHit {
                    record,
                    rank_score: score,
                }),
                None => warn!(id, "Indexed record missing from store; skipping"),
            }
        }
        debug!(path = %SearchPath::Indexed, hits = hits.len(), "Similarity search complete");
        Ok(hits)
    }

    async fn search_brute_force(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let records = self.store.embedded().await?;

        let skipped = records
            .iter()
            .filter(|r| r.dimension() != Some(query.len()))
            .count();
        if skipped > 0 {
            warn!(
                dimension = query.len(),
                skipped, "Excluding records embedded at a different dimension from ranking"
            );
        }

        let ranked = rank_candidates(
            records
                .iter()
                .filter_map(|r| r.embedding.as_deref().map(|v| (r.id, v))),
            query,
            k,
        );

        let mut hits = Vec::with_capacity(ranked.len());
        for (id, score) in ranked {
            if let Some(record) = records.iter().find(|r| r.id == id) {
                hits.push(SearchHit {
                    record: record.clone(),
                    rank_score: score,
                });
            }
        }
        debug!(path = %SearchPath::BruteForce, hits = hits.len(), "Similarity search complete");
        Ok(hits)
    }
}
