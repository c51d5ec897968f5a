//! Deterministic hash embeddings — the terminal fallback.
//!
//! Signed feature hashing: the SHA-256 digest of each whitespace-separated
//! token is split into four 64-bit words, and each word adds `±1` to slot
//! `word % dimension`, with the sign taken from the word's top bit. Texts
//! of any length map to the same fixed dimension, and distinct tokens land
//! on different slot patterns, so one-word texts are not collinear.
//!
//! These vectors carry **no semantic meaning**. They exist so the engine
//! keeps working offline and so tests get identical vectors for identical
//! text across processes.

use async_trait::async_trait;
use recall_core::embedding::Embedder;
use recall_core::error::EmbeddingError;
use sha2::{Digest, Sha256};

/// Infallible, deterministic embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.split_whitespace() {
            for (slot, sign) in token_features(token, self.dimension) {
                vector[slot] += sign;
            }
        }
        vector
    }

    pub fn embed_all(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Slots touched by a token per hash word.
const FEATURES_PER_TOKEN: usize = 4;

fn token_features(token: &str, dimension: usize) -> impl Iterator<Item = (usize, f32)> {
    let digest = Sha256::digest(token.as_bytes());
    let words: Vec<u64> = digest
        .chunks_exact(8)
        .take(FEATURES_PER_TOKEN)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            u64::from_le_bytes(bytes)
        })
        .collect();

    words.into_iter().map(move |word| {
        let slot = (word % dimension as u64) as usize;
        let sign = if word >> 63 == 1 { -1.0 } else { 1.0 };
        (slot, sign)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(self.embed_all(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_identical_vector() {
        let h = HashEmbedder::new(256);
        assert_eq!(h.embed_text("rust is fast"), h.embed_text("rust is fast"));
    }

    #[test]
    fn fixed_length_regardless_of_input() {
        let h = HashEmbedder::new(16);
        assert_eq!(h.embed_text("").len(), 16);
        assert_eq!(h.embed_text("one").len(), 16);
        let long = "word ".repeat(100);
        assert_eq!(h.embed_text(&long).len(), 16);
    }

    #[test]
    fn tokens_accumulate_signed_features() {
        let h = HashEmbedder::new(256);
        let alpha = h.embed_text("alpha");
        let beta = h.embed_text("beta");
        let both = h.embed_text("alpha beta");
        for i in 0..256 {
            assert_eq!(both[i], alpha[i] + beta[i]);
        }
        assert!(alpha.iter().all(|x| x.abs() <= FEATURES_PER_TOKEN as f32));
        assert!(alpha.iter().any(|x| *x != 0.0));
    }

    #[test]
    fn single_tokens_are_not_collinear() {
        let h = HashEmbedder::new(256);
        let words = ["rust", "python", "go", "tokio", "a", "b"];
        let vectors: Vec<_> = words.iter().map(|w| h.embed_text(w)).collect();
        let cosine = |a: &[f32], b: &[f32]| {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            dot / (na * nb)
        };
        for i in 0..vectors.len() {
            for j in (i + 1)..vectors.len() {
                assert!(
                    cosine(&vectors[i], &vectors[j]) < 0.99,
                    "{} vs {}",
                    words[i],
                    words[j]
                );
            }
        }
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let h = HashEmbedder::new(8);
        assert!(h.embed_text("   ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn whitespace_variants_collapse() {
        let h = HashEmbedder::new(8);
        assert_eq!(h.embed_text("a  b\tc"), h.embed_text("a b c"));
    }

    #[test]
    fn zero_dimension_clamped() {
        assert_eq!(HashEmbedder::new(0).dimension(), 1);
    }

    #[tokio::test]
    async fn trait_embed_preserves_order() {
        let h = HashEmbedder::new(4);
        let texts = vec!["first".to_string(), "second".to_string()];
        let out = h.embed(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], h.embed_text("first"));
        assert_eq!(out[1], h.embed_text("second"));
    }
}
