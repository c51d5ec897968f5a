//! Embedding fallback — ordered chain with per-stage timeouts.
//!
//! Stages are tried strictly in sequence for every call; the first stage
//! that returns a well-formed batch wins. Failures and timeouts are logged
//! and the chain moves on. The terminal [`HashEmbedder`] cannot fail, so
//! [`EmbeddingChain::embed`] always returns one vector per input.

use crate::hash::HashEmbedder;
use recall_core::embedding::Embedder;
use recall_core::error::EmbeddingError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An embedder that wraps an ordered list of backends and falls back on failure.
pub struct EmbeddingChain {
    stages: Vec<ChainStage>,
    terminal: HashEmbedder,
}

/// A single entry in the fallback chain.
struct ChainStage {
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
}

/// Vectors plus the name of the stage that produced them.
#[derive(Debug, Clone)]
pub struct Embedded {
    pub vectors: Vec<Vec<f32>>,
    pub stage: String,
}

impl EmbeddingChain {
    /// Create a chain that only has the terminal hash fallback.
    pub fn new(terminal: HashEmbedder) -> Self {
        Self {
            stages: Vec::new(),
            terminal,
        }
    }

    /// Append a stage, tried after every stage added before it.
    pub fn add(mut self, embedder: Arc<dyn Embedder>, timeout: Duration) -> Self {
        self.stages.push(ChainStage { embedder, timeout });
        self
    }

    /// Stage names in the order they are tried, terminal last.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .map(|s| s.embedder.name())
            .chain(std::iter::once(self.terminal.name()))
            .collect()
    }

    /// Embed `texts`. Never fails; `[]` in, `[]` out.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.embed_detailed(texts).await.vectors
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vectors = self.embed(&[text.to_string()]).await;
        vectors.pop().unwrap_or_else(|| self.terminal.embed_text(text))
    }

    /// Like [`embed`](Self::embed) but also reports which stage served the call.
    pub async fn embed_detailed(&self, texts: &[String]) -> Embedded {
        if texts.is_empty() {
            return Embedded {
                vectors: Vec::new(),
                stage: "none".into(),
            };
        }

        for (i, stage) in self.stages.iter().enumerate() {
            let name = stage.embedder.name();
            debug!(
                embedder = name,
                attempt = i + 1,
                total = self.stages.len() + 1,
                "Embedding: trying stage"
            );

            let outcome = match tokio::time::timeout(stage.timeout, stage.embedder.embed(texts)).await
            {
                Ok(result) => result.and_then(|vectors| validate(vectors, texts.len())),
                Err(_) => Err(EmbeddingError::Timeout(format!(
                    "'{}' timed out after {}s",
                    name,
                    stage.timeout.as_secs()
                ))),
            };

            match outcome {
                Ok(vectors) => {
                    debug!(embedder = name, dimension = vectors[0].len(), "Embedding: stage succeeded");
                    return Embedded {
                        vectors,
                        stage: name.to_string(),
                    };
                }
                Err(e) => {
                    warn!(embedder = name, error = %e, "Embedding: stage failed, trying next");
                }
            }
        }

        info!(
            count = texts.len(),
            dimension = self.terminal.dimension(),
            "Embedding: using non-semantic hash fallback"
        );
        Embedded {
            vectors: self.terminal.embed_all(texts),
            stage: self.terminal.name().to_string(),
        }
    }
}

/// A batch is usable only if it has one non-empty vector per input and all
/// vectors share one length.
fn validate(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::InvalidResponse(format!(
            "expected {expected} vectors, got {}",
            vectors.len()
        )));
    }
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(EmbeddingError::InvalidResponse("empty vector".into()));
    }
    if vectors.iter().any(|v| v.len() != dimension) {
        return Err(EmbeddingError::InvalidResponse(
            "vectors of mixed dimension in one batch".into(),
        ));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed vector per text and counts calls.
    struct FixedEmbedder {
        name: &'static str,
        value: Vec<f32>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new(name: &'static str, value: Vec<f32>) -> Self {
            Self {
                name,
                value,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn name(&self) -> &str {
            self.name
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| self.value.clone()).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Network("connection refused".into()))
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        fn name(&self) -> &str {
            "slow"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    /// Returns fewer vectors than requested.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn name(&self) -> &str {
            "short"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(vec![])
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let chain = EmbeddingChain::new(HashEmbedder::new(8));
        assert!(chain.embed(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn terminal_serves_when_no_stages() {
        let chain = EmbeddingChain::new(HashEmbedder::new(8));
        let out = chain.embed_detailed(&texts(&["x"])).await;
        assert_eq!(out.stage, "hash");
        assert_eq!(out.vectors.len(), 1);
        assert_eq!(out.vectors[0].len(), 8);
    }

    #[tokio::test]
    async fn first_success_wins_and_later_stages_untouched() {
        let first = Arc::new(FixedEmbedder::new("first", vec![1.0, 0.0]));
        let second = Arc::new(FixedEmbedder::new("second", vec![0.0, 1.0]));
        let chain = EmbeddingChain::new(HashEmbedder::new(8))
            .add(first.clone(), Duration::from_secs(1))
            .add(second.clone(), Duration::from_secs(1));

        let out = chain.embed_detailed(&texts(&["a", "b"])).await;
        assert_eq!(out.stage, "first");
        assert_eq!(out.vectors, vec![vec![1.0, 0.0], vec![1.0, 0.0]]);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_advances_to_next_stage() {
        let backup = Arc::new(FixedEmbedder::new("backup", vec![0.5; 3]));
        let chain = EmbeddingChain::new(HashEmbedder::new(8))
            .add(Arc::new(FailingEmbedder), Duration::from_secs(1))
            .add(backup.clone(), Duration::from_secs(1));

        let out = chain.embed_detailed(&texts(&["a"])).await;
        assert_eq!(out.stage, "backup");
        assert_eq!(backup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_advances_to_next_stage() {
        let chain = EmbeddingChain::new(HashEmbedder::new(4))
            .add(Arc::new(SlowEmbedder), Duration::from_secs(10));

        let out = chain.embed_detailed(&texts(&["a"])).await;
        assert_eq!(out.stage, "hash");
        assert_eq!(out.vectors[0].len(), 4);
    }

    #[tokio::test]
    async fn malformed_batch_is_treated_as_failure() {
        let chain = EmbeddingChain::new(HashEmbedder::new(4))
            .add(Arc::new(ShortEmbedder), Duration::from_secs(1));

        let out = chain.embed_detailed(&texts(&["a", "b"])).await;
        assert_eq!(out.stage, "hash");
        assert_eq!(out.vectors.len(), 2);
    }

    #[tokio::test]
    async fn all_failing_still_returns_one_vector_per_text() {
        let chain = EmbeddingChain::new(HashEmbedder::new(256))
            .add(Arc::new(FailingEmbedder), Duration::from_secs(1));

        let out = chain.embed(&texts(&["one", "two", "three"])).await;
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == 256));
    }

    #[tokio::test]
    async fn embed_one_is_deterministic_offline() {
        let chain = EmbeddingChain::new(HashEmbedder::new(32));
        assert_eq!(chain.embed_one("same text").await, chain.embed_one("same text").await);
    }

    #[test]
    fn validate_rejects_mixed_dimensions() {
        let result = validate(vec![vec![1.0, 2.0], vec![1.0]], 2);
        assert!(matches!(result, Err(EmbeddingError::InvalidResponse(_))));
    }
}
