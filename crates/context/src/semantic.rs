//! Semantic context: search hits rendered as a bounded text block.

use recall_core::memory::SearchHit;

/// Characters of context allowed per configured "max token".
pub const CHARS_PER_TOKEN_CAP: usize = 5;

/// Appended when the block was cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Render hits as `[source #id] text` blocks separated by blank lines,
/// capped at `max_tokens * 5` characters.
pub fn render_hits(hits: &[SearchHit], max_tokens: usize) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let block = hits
        .iter()
        .map(|h| format!("[{} #{}] {}", h.record.source, h.record.id, h.record.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(block, max_tokens.saturating_mul(CHARS_PER_TOKEN_CAP))
}

fn truncate_chars(text: String, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((byte_offset, _)) => {
            let mut cut = text[..byte_offset].to_string();
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        None => text,
    }
}

/// The prompt handed to a model when answering with retrieved context.
pub fn contextual_prompt(context: &str, query: &str) -> String {
    format!("Relevant context:\n{context}\n\nUser query:\n{query}\n\nAnswer:")
}
