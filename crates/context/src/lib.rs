//! Context assembly for recall.
//!
//! | Service | Input | Output |
//! |---------|-------|--------|
//! | Semantic | query | `[source #id] text` blocks, capped at `max_tokens * 5` chars |
//! | Session | newest-first history | oldest-first messages within a token budget |

pub mod assembler;
pub mod semantic;
pub mod session;
pub mod token;

pub use assembler::{ContextAssembler, ContextOutput};
pub use semantic::{contextual_prompt, render_hits};
pub use session::{SessionContext, Turn, build_session_context, pair_turns};
pub use token::estimate_tokens;
