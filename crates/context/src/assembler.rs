//! Context assembly service.
//!
//! Two independent services over one [`MemoryEngine`]:
//!
//! 1. **Semantic context**: top hits for a query, as text or as hits.
//! 2. **Session context**: a session's history trimmed to a token budget.

use crate::semantic;
use crate::session::{self, SessionContext};
use recall_config::{ContextConfig, DEFAULT_TOKEN_BUDGET};
use recall_core::error::Result;
use recall_core::memory::SearchHit;
use recall_core::message::HistoryEntry;
use recall_memory::{DEFAULT_SESSION_LIMIT, MemoryEngine};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Semantic context in the shape the caller asked for.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ContextOutput {
    Text(String),
    Hits(Vec<SearchHit>),
}

impl ContextOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            ContextOutput::Text(text) => text.is_empty(),
            ContextOutput::Hits(hits) => hits.is_empty(),
        }
    }
}

pub struct ContextAssembler {
    engine: Arc<MemoryEngine>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(engine: Arc<MemoryEngine>, config: ContextConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &Arc<MemoryEngine> {
        &self.engine
    }

    /// Top `limit` hits for `query`, rendered as text when `as_text`.
    /// An empty store yields `""` or no hits, never an error.
    pub async fn get_context(&self, query: &str, limit: usize, as_text: bool) -> Result<ContextOutput> {
        let hits = self.engine.search(query, limit).await?;
        debug!(hits = hits.len(), as_text, "Semantic context retrieved");

        Ok(if as_text {
            ContextOutput::Text(semantic::render_hits(&hits, self.config.max_tokens))
        } else {
            ContextOutput::Hits(hits)
        })
    }

    /// Semantic context as a text block.
    pub async fn context_text(&self, query: &str, limit: usize) -> Result<String> {
        let hits = self.engine.search(query, limit).await?;
        Ok(semantic::render_hits(&hits, self.config.max_tokens))
    }

    /// A model prompt combining the default-sized context with `query`.
    pub async fn contextual_prompt(&self, query: &str) -> Result<String> {
        self.contextual_prompt_with_limit(query, self.config.default_limit)
            .await
    }

    /// Like [`contextual_prompt`](Self::contextual_prompt) with `limit` hits.
    pub async fn contextual_prompt_with_limit(&self, query: &str, limit: usize) -> Result<String> {
        let context = self.context_text(query, limit).await?;
        Ok(semantic::contextual_prompt(&context, query))
    }

    /// Trim newest-first `history` to `budget` tokens (the configured
    /// budget when `None`).
    pub fn build_session_context(&self, history: &[HistoryEntry], budget: Option<usize>) -> SessionContext {
        session::build_session_context(history, self.resolve_budget(budget))
    }

    /// Load a session's history from the engine and trim it.
    pub async fn session_context(&self, session_id: &str, budget: Option<usize>) -> Result<SessionContext> {
        let records = self
            .engine
            .session_history(session_id, DEFAULT_SESSION_LIMIT)
            .await?;
        let history: Vec<HistoryEntry> = records.iter().map(HistoryEntry::from).collect();
        Ok(self.build_session_context(&history, budget))
    }

    fn resolve_budget(&self, budget: Option<usize>) -> usize {
        match budget {
            Some(b) if b > 0 => b,
            Some(_) => {
                warn!(default = DEFAULT_TOKEN_BUDGET, "Token budget must be positive; using default");
                DEFAULT_TOKEN_BUDGET
            }
            None if self.config.token_budget > 0 => self.config.token_budget,
            None => {
                warn!(default = DEFAULT_TOKEN_BUDGET, "Configured token budget is zero; using default");
                DEFAULT_TOKEN_BUDGET
            }
        }
    }
}
