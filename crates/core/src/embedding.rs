//! Embedder trait — the abstraction over text-to-vector backends.
//!
//! An Embedder turns a batch of texts into one vector per text. Individual
//! backends may fail; the fallback chain in `recall-embeddings` composes
//! them into an always-available capability.
//!
//! Implementations: OpenAI-compatible, Ollama, local Candle model, hash.

use async_trait::async_trait;
use crate::error::EmbeddingError;

/// A single embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The backend name (e.g., "openai", "ollama", "hash").
    fn name(&self) -> &str;

    /// Embed every text in `texts`.
    ///
    /// On success the result has the same length and order as the input.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError>;
}
