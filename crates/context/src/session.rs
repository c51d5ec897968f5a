//! Session-history context: turn pairing and a token-budget walk.
//!
//! Input is one session's history, newest first. The output is a flat,
//! oldest-first message list that ends with the most recent user message
//! and stays within the token budget, except that the most recent user
//! message itself is always kept.
//!
//! Assembly is deterministic: identical history and budget always produce
//! identical output.

use crate::token::{estimate_entries_tokens, estimate_tokens};
use recall_core::message::{ChatMessage, HistoryEntry, Role};
use serde::Serialize;
use tracing::debug;

/// A paired (or singleton) exchange derived from newest-first history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turn<'a> {
    pub user: Option<&'a HistoryEntry>,
    pub assistant: Option<&'a HistoryEntry>,
}

impl Turn<'_> {
    fn user_text(&self) -> &str {
        self.user.map_or("", |e| e.content.as_str())
    }

    fn user_tokens(&self) -> usize {
        self.user.map_or(0, |e| estimate_tokens(&e.content))
    }

    /// An empty reply costs nothing.
    fn assistant_tokens(&self) -> usize {
        self.assistant
            .filter(|e| !e.content.is_empty())
            .map_or(0, |e| estimate_tokens(&e.content))
    }
}

/// The assembled session context plus what the budget walk did.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    /// Oldest first, most recent user message last.
    pub messages: Vec<ChatMessage>,
    /// Estimated tokens of everything in `messages`.
    pub total_tokens: usize,
    pub budget: usize,
    pub turns_included: usize,
    pub turns_total: usize,
}

/// Pair newest-first history into turns in a single forward pass.
///
/// An assistant entry immediately followed by a user entry forms one turn
/// with both; any other entry forms a singleton turn. Non-assistant roles
/// other than `user` occupy the user slot.
pub fn pair_turns(history: &[HistoryEntry]) -> Vec<Turn<'_>> {
    let mut turns = Vec::with_capacity(history.len());
    let mut i = 0;

    while i < history.len() {
        let entry = &history[i];
        if entry.role == Role::Assistant {
            match history.get(i + 1).filter(|next| next.role == Role::User) {
                Some(user) => {
                    turns.push(Turn {
                        user: Some(user),
                        assistant: Some(entry),
                    });
                    i += 2;
                }
                None => {
                    turns.push(Turn {
                        user: None,
                        assistant: Some(entry),
                    });
                    i += 1;
                }
            }
        } else {
            turns.push(Turn {
                user: Some(entry),
                assistant: None,
            });
            i += 1;
        }
    }
    turns
}

/// Build a budgeted, oldest-first message list from newest-first history.
pub fn build_session_context(history: &[HistoryEntry], budget: usize) -> SessionContext {
    let turns = pair_turns(history);
    let mut included: Vec<Turn<'_>> = Vec::new();
    let mut total = 0usize;
    let mut seen_user = false;

    for turn in &turns {
        let t_user = turn.user_tokens();
        let t_assistant = turn.assistant_tokens();

        if !seen_user && !turn.user_text().is_empty() {
            // The most recent user message is always kept; its reply only
            // if it still fits.
            seen_user = true;
            total += t_user;
            let assistant = if turn.assistant.is_some() && total + t_assistant <= budget {
                total += t_assistant;
                turn.assistant
            } else {
                None
            };
            included.push(Turn {
                user: turn.user,
                assistant,
            });
            continue;
        }

        if total + t_user + t_assistant <= budget {
            included.push(*turn);
            total += t_user + t_assistant;
        } else if seen_user {
            break;
        }
        // Replies newer than the latest user message that do not fit are
        // skipped so the walk still reaches that message.
    }

    let messages: Vec<ChatMessage> = included
        .iter()
        .rev()
        .flat_map(|turn| [turn.user, turn.assistant])
        .flatten()
        .map(ChatMessage::from)
        .collect();

    debug!(
        budget,
        history_tokens = estimate_entries_tokens(history),
        total_tokens = total,
        turns_included = included.len(),
        turns_dropped = turns.len() - included.len(),
        "Session context assembled"
    );

    SessionContext {
        messages,
        total_tokens: total,
        budget,
        turns_included: included.len(),
        turns_total: turns.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(ctx: &SessionContext) -> Vec<&str> {
        ctx.messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn assistant_pairs_with_following_user() {
        let history = vec![HistoryEntry::assistant("a1"), HistoryEntry::user("m1")];
        let turns = pair_turns(&history);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user.unwrap().content, "m1");
        assert_eq!(turns[0].assistant.unwrap().content, "a1");

        let ctx = build_session_context(&history, 3000);
        assert_eq!(
            ctx.messages,
            vec![
                ChatMessage {
                    role: Role::User,
                    content: "m1".into()
                },
                ChatMessage {
                    role: Role::Assistant,
                    content: "a1".into()
                },
            ]
        );
    }

    #[test]
    fn singletons_for_unpaired_entries() {
        let history = vec![
            HistoryEntry::user("m3"),
            HistoryEntry::assistant("a2"),
            HistoryEntry::assistant("a1"),
            HistoryEntry::new("system", "sys"),
        ];
        let turns = pair_turns(&history);
        assert_eq!(turns.len(), 4);
        assert!(turns[0].assistant.is_none());
        assert!(turns[1].user.is_none());
        assert!(turns[2].user.is_none());
        assert_eq!(turns[3].user.unwrap().role, Role::System);
    }

    #[test]
    fn pairing_consumes_both_entries() {
        let history = vec![
            HistoryEntry::assistant("a2"),
            HistoryEntry::user("m2"),
            HistoryEntry::assistant("a1"),
            HistoryEntry::user("m1"),
        ];
        let ctx = build_session_context(&history, 3000);
        assert_eq!(contents(&ctx), vec!["m1", "a1", "m2", "a2"]);
        assert_eq!(ctx.turns_total, 2);
    }

    #[test]
    fn oversized_latest_user_message_is_still_included() {
        let huge = "q".repeat(40_000);
        let history = vec![HistoryEntry::user(huge.clone()), HistoryEntry::user("older")];
        let ctx = build_session_context(&history, 100);
        assert_eq!(contents(&ctx), vec![huge.as_str()]);
        assert!(ctx.total_tokens > ctx.budget);
    }

    #[test]
    fn reply_in_first_turn_dropped_when_over_budget() {
        let history = vec![
            HistoryEntry::assistant("r".repeat(400)),
            HistoryEntry::user("u".repeat(40)),
        ];
        let ctx = build_session_context(&history, 50);
        assert_eq!(ctx.messages.len(), 1);
        assert_eq!(ctx.messages[0].role, Role::User);
        assert_eq!(ctx.total_tokens, 10);
    }

    #[test]
    fn older_turns_are_never_split() {
        let history = vec![
            HistoryEntry::user("now"),
            HistoryEntry::assistant("a".repeat(40)), // 10 tokens
            HistoryEntry::user("b".repeat(40)),      // 10 tokens
            HistoryEntry::user("tiny"),
        ];
        // 1 (forced) + 20 for the pair does not fit in 15, so the walk stops
        // there and never reaches "tiny".
        let ctx = build_session_context(&history, 15);
        assert_eq!(contents(&ctx), vec!["now"]);
        assert_eq!(ctx.turns_included, 1);
    }

    #[test]
    fn newer_reply_that_does_not_fit_is_skipped() {
        let history = vec![
            HistoryEntry::assistant("z".repeat(4000)),
            HistoryEntry::new("system", "note"),
            HistoryEntry::user("question"),
        ];
        let ctx = build_session_context(&history, 100);
        assert_eq!(contents(&ctx), vec!["question", "note"]);
    }

    #[test]
    fn budget_holds_excluding_forced_message() {
        let mut history = vec![HistoryEntry::user("final prompt to include")];
        for i in (0..80).rev() {
            history.push(HistoryEntry::user(format!("{i}-{}", "x".repeat(200))));
        }

        let ctx = build_session_context(&history, 3000);
        assert_eq!(
            ctx.messages.last().map(|m| m.content.as_str()),
            Some("final prompt to include")
        );
        let sum: usize = ctx.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        assert_eq!(sum, ctx.total_tokens);
        assert!(sum <= 3000);
        assert!(ctx.messages.len() < 81);
    }

    #[test]
    fn empty_reply_costs_nothing() {
        let history = vec![HistoryEntry::assistant(""), HistoryEntry::user("u".repeat(40))];
        // 10 tokens for the user message; the empty reply still fits in 10.
        let ctx = build_session_context(&history, 10);
        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.total_tokens, 10);

        let older = "b".repeat(40);
        let history = vec![
            HistoryEntry::user("now"),
            HistoryEntry::assistant(""),
            HistoryEntry::user(older.clone()),
        ];
        let ctx = build_session_context(&history, 11);
        assert_eq!(contents(&ctx), vec![older.as_str(), "", "now"]);
        assert_eq!(ctx.total_tokens, 11);
    }

    #[test]
    fn empty_history_is_empty() {
        let ctx = build_session_context(&[], 3000);
        assert!(ctx.messages.is_empty());
        assert_eq!(ctx.total_tokens, 0);
    }

    #[test]
    fn deterministic() {
        let history: Vec<_> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    HistoryEntry::assistant(format!("reply {i} {}", "r".repeat(i * 7)))
                } else {
                    HistoryEntry::user(format!("msg {i} {}", "m".repeat(i * 5)))
                }
            })
            .collect();
        let a = build_session_context(&history, 300);
        let b = build_session_context(&history, 300);
        assert_eq!(a.messages, b.messages);
        assert_eq!(a.total_tokens, b.total_tokens);
    }
}
