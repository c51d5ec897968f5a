//! Configuration loading, validation, and management for recall.
//!
//! Loads configuration from `~/.recall/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Budget used when no (valid) token budget is configured.
pub const DEFAULT_TOKEN_BUDGET: usize = 3000;

/// The root configuration structure.
///
/// Maps directly to `~/.recall/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding fallback chain
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Record store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Vector index and its on-disk snapshot
    #[serde(default)]
    pub index: IndexConfig,

    /// Context assembly limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Retention sweep
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Per-attempt timeout for every stage of the chain
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Vector length produced by the deterministic hash fallback
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,

    /// Local model alias or directory (requires the `local` feature)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_model: Option<String>,

    /// Primary remote API
    #[serde(default)]
    pub openai: OpenAiEmbeddingConfig,

    /// Secondary remote API
    #[serde(default)]
    pub ollama: OllamaEmbeddingConfig,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_hash_dimension() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            hash_dimension: default_hash_dimension(),
            local_model: None,
            openai: OpenAiEmbeddingConfig::default(),
            ollama: OllamaEmbeddingConfig::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiEmbeddingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_openai_url")]
    pub api_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_openai_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_openai_url(),
            model: default_openai_model(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for OpenAiEmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaEmbeddingConfig {
    /// e.g. `http://localhost:11434`; the stage is skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_model() -> String {
    "nomic-embed-text".into()
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            host: None,
            model: default_ollama_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite", "file", or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database / log file; defaults to a file under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Resolved store location for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match self.backend.as_str() {
            "file" => AppConfig::config_dir().join("memories.jsonl"),
            _ => AppConfig::config_dir().join("memory.sqlite"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// When false every search takes the brute-force path
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: None,
        }
    }
}

impl IndexConfig {
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.index.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Semantic context is capped at `max_tokens * 5` characters
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Session-history token budget. Invalid values fall back to the default.
    #[serde(default = "default_token_budget", deserialize_with = "lenient_token_budget")]
    pub token_budget: usize,

    /// Hits per semantic context request
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_max_tokens() -> usize {
    2000
}
fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}
fn default_limit() -> usize {
    5
}

fn lenient_token_budget<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = match toml::Value::deserialize(deserializer)? {
        toml::Value::String(s) => s,
        toml::Value::Integer(i) => i.to_string(),
        other => other.to_string(),
    };
    Ok(parse_token_budget(&raw))
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            token_budget: default_token_budget(),
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u32,
}

fn default_max_age_days() -> u32 {
    30
}
fn default_sweep_interval_hours() -> u32 {
    24
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            sweep_interval_hours: default_sweep_interval_hours(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recall/config.toml).
    ///
    /// Environment variables override file settings:
    /// - `OPENAI_API_KEY`, `RECALL_OPENAI_URL`
    /// - `OLLAMA_HOST`
    /// - `RECALL_LOCAL_MODEL`
    /// - `RECALL_STORE_PATH`
    /// - `RECALL_TOKEN_BUDGET`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.embedding.openai.api_key = Some(key);
        }
        if let Some(url) = lookup("RECALL_OPENAI_URL") {
            self.embedding.openai.api_url = url;
        }
        if let Some(host) = lookup("OLLAMA_HOST").filter(|h| !h.trim().is_empty()) {
            self.embedding.ollama.host = Some(host);
        }
        if let Some(model) = lookup("RECALL_LOCAL_MODEL") {
            self.embedding.local_model = Some(model);
        }
        if let Some(path) = lookup("RECALL_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("RECALL_TOKEN_BUDGET") {
            self.context.token_budget = parse_token_budget(&raw);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recall")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.hash_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.hash_dimension must be > 0".into(),
            ));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.timeout_secs must be > 0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be one of sqlite, file, memory (got '{}')",
                self.store.backend
            )));
        }

        if self.context.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_tokens must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Parse a token budget override. Malformed or non-positive values fall
/// back to [`DEFAULT_TOKEN_BUDGET`].
pub fn parse_token_budget(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(budget) if budget > 0 => budget,
        _ => {
            tracing::warn!(
                value = raw,
                default = DEFAULT_TOKEN_BUDGET,
                "Invalid token budget override, using default"
            );
            DEFAULT_TOKEN_BUDGET
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
