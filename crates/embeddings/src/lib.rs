//! Embedding backends for recall.
//!
//! All backends implement the `recall_core::Embedder` trait. The
//! [`EmbeddingChain`] tries them in a fixed order and ends in the
//! deterministic [`HashEmbedder`], so embedding never fails.

pub mod chain;
pub mod hash;
#[cfg(feature = "local")]
pub mod local;
pub mod ollama;
pub mod openai;

pub use chain::{Embedded, EmbeddingChain};
pub use hash::HashEmbedder;
#[cfg(feature = "local")]
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use recall_config::EmbeddingConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the fallback chain described by `config`.
///
/// Order: local model (only if it loads now), primary remote API (only
/// with an API key), secondary remote API (only with a host), hash.
/// The local model is probed once here, never per call.
pub async fn build_chain(config: &EmbeddingConfig) -> EmbeddingChain {
    let timeout = Duration::from_secs(config.timeout_secs);
    let mut chain = EmbeddingChain::new(HashEmbedder::new(config.hash_dimension));

    if let Some(model) = &config.local_model {
        chain = add_local_stage(chain, model, timeout).await;
    }

    if let Some(api_key) = &config.openai.api_key {
        chain = chain.add(
            Arc::new(OpenAiEmbedder::new(
                &config.openai.api_url,
                api_key,
                &config.openai.model,
                timeout,
            )),
            timeout,
        );
    }

    if let Some(host) = &config.ollama.host {
        chain = chain.add(
            Arc::new(OllamaEmbedder::new(host, &config.ollama.model, timeout)),
            timeout,
        );
    }

    info!(stages = ?chain.stage_names(), "Embedding chain ready");
    chain
}

#[cfg(feature = "local")]
async fn add_local_stage(chain: EmbeddingChain, model: &str, timeout: Duration) -> EmbeddingChain {
    let name = model.to_string();
    match tokio::task::spawn_blocking(move || LocalEmbedder::load(&name)).await {
        Ok(Ok(embedder)) => chain.add(Arc::new(embedder), timeout),
        Ok(Err(e)) => {
            tracing::warn!(model, error = %e, "Local embedding model unavailable, skipping stage");
            chain
        }
        Err(e) => {
            tracing::warn!(model, error = %e, "Local model loading task failed, skipping stage");
            chain
        }
    }
}

#[cfg(not(feature = "local"))]
async fn add_local_stage(chain: EmbeddingChain, model: &str, _timeout: Duration) -> EmbeddingChain {
    tracing::warn!(
        model,
        "Local embedding model configured but built without the `local` feature, skipping stage"
    );
    chain
}
