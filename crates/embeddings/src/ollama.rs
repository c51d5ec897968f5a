//! Ollama embedding backend — the secondary remote API.
//!
//! Ollama's `/api/embeddings` endpoint takes one prompt per request, so a
//! batch is sent as sequential requests. Any failure fails the whole batch.

use async_trait::async_trait;
use recall_core::embedding::Embedder;
use recall_core::error::EmbeddingError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OllamaEmbedder {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(host: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            host: host.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.host);
        let body = serde_json::json!({ "model": self.model, "prompt": text });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(e.to_string())
                } else {
                    EmbeddingError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            EmbeddingError::InvalidResponse(format!("Failed to parse Ollama response: {e}"))
        })?;

        if parsed.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "Ollama returned an empty embedding for model '{}'",
                self.model
            )));
        }
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        debug!(host = %self.host, model = %self.model, count = texts.len(), "Sending Ollama embedding requests");
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_single(text).await?);
        }
        Ok(vectors)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response() {
        let parsed: OllamaEmbeddingResponse =
            serde_json::from_str(r#"{"embedding": [0.25, -0.5]}"#).unwrap();
        assert_eq!(parsed.embedding, vec![0.25, -0.5]);
    }

    #[test]
    fn missing_embedding_field_defaults_to_empty() {
        let parsed: OllamaEmbeddingResponse = serde_json::from_str(r#"{"error": "no model"}"#).unwrap();
        assert!(parsed.embedding.is_empty());
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let e = OllamaEmbedder::new("http://127.0.0.1:9/", "nomic-embed-text", Duration::from_secs(2));
        assert_eq!(e.host, "http://127.0.0.1:9");
        assert!(e.embed(&["hi".to_string()]).await.is_err());
    }
}
