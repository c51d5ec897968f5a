//! # Recall Core
//!
//! Domain types, traits, and error definitions for the recall memory engine.
//! This crate has **no I/O**. It defines the domain model that the
//! embedding, storage, and context crates implement against.
//!
//! ## Seams
//!
//! - [`Embedder`] — one text-to-vector backend (remote API, local model, hash).
//! - [`RecordStore`] — the durable, append-mostly record log.
//!
//! Everything else (vector index, similarity search, context assembly) is
//! derived from these two.

pub mod embedding;
pub mod error;
pub mod memory;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use embedding::Embedder;
pub use error::{EmbeddingError, Error, IndexError, Result, StoreError};
pub use memory::{MemoryRecord, NewRecord, RecordId, RecordStore, SearchHit};
pub use message::{ChatMessage, HistoryEntry, Role};
