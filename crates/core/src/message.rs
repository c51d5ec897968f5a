//! Conversation roles and messages used by session-context assembly.
//!
//! Session history arrives as plain role/content pairs (usually loaded
//! from session-log records) and leaves as the same shape, ready to be
//! sent to a chat-completion API.

use serde::{Deserialize, Serialize};
use crate::memory::MemoryRecord;

/// The role of a message sender in a conversation.
///
/// Unknown roles are preserved verbatim in [`Role::Other`] so they can be
/// echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Anything else
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an ordered session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&MemoryRecord> for HistoryEntry {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            role: Role::from(record.role.as_deref().unwrap_or("")),
            content: record.text.clone(),
        }
    }
}

/// A role/content pair in an assembled context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&HistoryEntry> for ChatMessage {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            role: entry.role.clone(),
            content: entry.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::NewRecord;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from("User"), Role::User);
        assert_eq!(Role::from("ASSISTANT"), Role::Assistant);
        assert_eq!(Role::from("tool"), Role::Other("tool".into()));
    }

    #[test]
    fn role_serializes_as_plain_string() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: "hi".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let other: Role = serde_json::from_str("\"narrator\"").unwrap();
        assert_eq!(other.as_str(), "narrator");
    }

    #[test]
    fn history_entry_from_session_record() {
        let record = NewRecord::new("hello", "chat")
            .with_session("s1", "user")
            .commit(3);
        let entry = HistoryEntry::from(&record);
        assert_eq!(entry.role, Role::User);
        assert_eq!(entry.content, "hello");
    }

    #[test]
    fn record_without_role_maps_to_other() {
        let record = NewRecord::new("note", "system").commit(1);
        let entry = HistoryEntry::from(&record);
        assert_eq!(entry.role, Role::Other(String::new()));
    }
}
