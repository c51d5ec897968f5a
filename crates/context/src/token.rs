//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded up,
//! and never less than one token, even for empty text.

use recall_core::message::HistoryEntry;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    ((text.chars().count() + 3) / 4).max(1)
}

/// Estimate tokens for a slice of history entries.
pub fn estimate_entries_tokens(entries: &[HistoryEntry]) -> usize {
    entries.iter().map(|e| estimate_tokens(&e.content)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_one() {
        assert_eq!(estimate_tokens(""), 1);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn two_hundred_chars() {
        assert_eq!(estimate_tokens(&"x".repeat(200)), 50);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(estimate_tokens("åäöü"), 1);
    }

    #[test]
    fn multiple_entries() {
        let entries = vec![HistoryEntry::user("hello"), HistoryEntry::assistant("world")];
        assert_eq!(estimate_entries_tokens(&entries), 4);
    }
}
