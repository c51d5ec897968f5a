//! Local embedding backend — runs a sentence-transformer on your hardware.
//!
//! Uses [Candle](https://github.com/huggingface/candle) to run BERT-family
//! sentence embedding models with no network access after the first
//! download. Output vectors are mean-pooled over the attention mask and
//! L2-normalized.
//!
//! Supported presets:
//! - **all-minilm-l6-v2** (384 dims) — default, small and fast
//! - **bge-small** (384 dims)
//! - **bge-base** (768 dims)
//!
//! Any other value is treated as a HuggingFace repo id or as a local
//! directory containing `config.json`, `tokenizer.json`, and
//! `model.safetensors`.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::api::sync::Api;
use recall_core::embedding::Embedder;
use recall_core::error::EmbeddingError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};
use tracing::info;

fn resolve_preset(alias: &str) -> Option<&'static str> {
    match alias.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "minilm" | "all-minilm" => Some("sentence-transformers/all-MiniLM-L6-v2"),
        "bge-small" | "bge-small-en" => Some("BAAI/bge-small-en-v1.5"),
        "bge-base" | "bge-base-en" => Some("BAAI/bge-base-en-v1.5"),
        _ => None,
    }
}

/// A loaded local sentence-embedding model.
pub struct LocalEmbedder {
    state: Arc<LocalModelState>,
}

struct LocalModelState {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl LocalEmbedder {
    /// Load eagerly (downloads on first use). Blocking; call from
    /// `spawn_blocking` inside async contexts.
    pub fn load(model_name: &str) -> Result<Self, EmbeddingError> {
        let state = LocalModelState::load(model_name)?;
        Ok(Self {
            state: Arc::new(state),
        })
    }
}

impl LocalModelState {
    fn load(model_name: &str) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;
        let (config_path, tokenizer_path, weights_path) = Self::resolve_files(model_name)?;

        let config_text = std::fs::read_to_string(&config_path)
            .map_err(|e| EmbeddingError::NotConfigured(format!("Failed to read model config: {e}")))?;
        let config: Config = serde_json::from_str(&config_text)
            .map_err(|e| EmbeddingError::NotConfigured(format!("Failed to parse model config: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        let weights = std::fs::read(&weights_path)
            .map_err(|e| EmbeddingError::NotConfigured(format!("Failed to read weights: {e}")))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DTYPE, &device)
            .map_err(map_candle_err)?;
        let model = BertModel::load(vb, &config).map_err(map_candle_err)?;

        info!(model = model_name, "Local embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn resolve_files(model_name: &str) -> Result<(PathBuf, PathBuf, PathBuf), EmbeddingError> {
        let dir = Path::new(model_name);
        if dir.is_dir() {
            return Ok((
                dir.join("config.json"),
                dir.join("tokenizer.json"),
                dir.join("model.safetensors"),
            ));
        }

        let repo_id = match resolve_preset(model_name) {
            Some(repo) => repo.to_string(),
            None if model_name.contains('/') => model_name.to_string(),
            None => {
                return Err(EmbeddingError::NotConfigured(format!(
                    "Unknown local embedding model '{model_name}'. Available presets: \
                     all-minilm-l6-v2, bge-small, bge-base. Or provide a HuggingFace repo id \
                     or a model directory."
                )));
            }
        };

        info!(model = model_name, repo = %repo_id, "Downloading/loading local embedding model");

        let api = Api::new().map_err(|e| {
            EmbeddingError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;
        let repo = api.model(repo_id.clone());
        let fetch = |file: &str| {
            repo.get(file).map_err(|e| {
                EmbeddingError::Network(format!("Failed to download '{file}' from '{repo_id}': {e}"))
            })
        };

        Ok((
            fetch("config.json")?,
            fetch("tokenizer.json")?,
            fetch("model.safetensors")?,
        ))
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| EmbeddingError::Inference(format!("Tokenization failed: {e}")))?;

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_candle_err)?;
        let masks = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_candle_err)?;

        let input_ids = Tensor::stack(&ids, 0).map_err(map_candle_err)?;
        let attention_mask = Tensor::stack(&masks, 0).map_err(map_candle_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(map_candle_err)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(map_candle_err)?;

        // Mean pooling over real tokens, then L2 normalization.
        let pooled = (|| {
            let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
            let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
            let counts = mask.sum(1)?;
            let mean = summed.broadcast_div(&counts)?;
            let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
            mean.broadcast_div(&norm)?.to_vec2::<f32>()
        })()
        .map_err(map_candle_err)?;

        Ok(pooled)
    }
}

fn map_candle_err(e: candle_core::Error) -> EmbeddingError {
    EmbeddingError::Inference(format!("Candle error: {e}"))
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn name(&self) -> &str {
        "local"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let state = self.state.clone();
        let texts = texts.to_vec();
        // Candle is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || state.embed(texts))
            .await
            .map_err(|e| EmbeddingError::Inference(format!("Inference task panicked: {e}")))?
    }
}
