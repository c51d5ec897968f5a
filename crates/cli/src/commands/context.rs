//! `recall context|session-context` — Context assembly commands.

use super::{CommandResult, load_config, open_engine};
use recall_context::{ContextAssembler, ContextOutput};
use recall_core::message::HistoryEntry;
use std::path::{Path, PathBuf};

pub async fn semantic(query: &str, limit: Option<usize>, json: bool, prompt: bool) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let limit = limit.unwrap_or(config.context.default_limit);
    let assembler = ContextAssembler::new(engine, config.context);

    if prompt {
        println!("{}", assembler.contextual_prompt_with_limit(query, limit).await?);
        return Ok(());
    }

    match assembler.get_context(query, limit, !json).await? {
        ContextOutput::Text(text) if text.is_empty() => {
            eprintln!("(no relevant memories)");
        }
        ContextOutput::Text(text) => println!("{text}"),
        hits @ ContextOutput::Hits(_) => println!("{}", serde_json::to_string_pretty(&hits)?),
    }

    Ok(())
}

pub async fn session(file: Option<PathBuf>, session: Option<String>, budget: Option<usize>) -> CommandResult {
    let config = load_config()?;
    let engine = open_engine(&config).await?;
    let assembler = ContextAssembler::new(engine, config.context);

    let context = match (file, session) {
        (Some(path), _) => {
            let history = read_history(&path)?;
            assembler.build_session_context(&history, budget)
        }
        (None, Some(id)) => assembler.session_context(&id, budget).await?,
        (None, None) => return Err("either --file or --session is required".into()),
    };

    eprintln!(
        "📜 {} of {} turns, {} / {} tokens",
        context.turns_included, context.turns_total, context.total_tokens, context.budget
    );
    println!("{}", serde_json::to_string_pretty(&context.messages)?);
    Ok(())
}

/// Newest-first `[{"role", "content"}]` history from a JSON file.
fn read_history(path: &Path) -> Result<Vec<HistoryEntry>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read history file {}: {e}", path.display()))?;
    let history = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse history file {}: {e}", path.display()))?;
    Ok(history)
}
