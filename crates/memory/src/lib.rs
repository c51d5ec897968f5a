//! Record stores, vector index, and similarity search for recall.
//!
//! [`MemoryEngine`] is the entry point: it owns a [`RecordStore`]
//! implementation, the embedding chain, and a [`VectorIndex`] derived from
//! the store.
//!
//! [`RecordStore`]: recall_core::RecordStore

mod atomic;
pub mod engine;
pub mod file_backend;
pub mod in_memory;
pub mod index;
pub mod retention;
pub mod search;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use engine::{DEFAULT_SESSION_LIMIT, EngineOptions, EngineStats, LEARN_SOURCE, MemoryEngine};
pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use index::VectorIndex;
pub use retention::{RetentionSweeper, SweeperHandle};
pub use search::{SearchPath, SimilaritySearch};
pub use vector::{cosine_similarity, rank_candidates};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
