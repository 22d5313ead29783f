//! Conversation turn orchestration.
//!
//! This crate composes the guardrails, context manager, query rewriter,
//! retrieval merger, prompt assembler, and model provider into a single
//! pipeline around one conversation turn, exposed as a lazy stream of turn
//! events. Tokens are forwarded to the consumer as they arrive; the turn is
//! committed atomically (user question + assistant answer) only after the
//! stream completes.

#![warn(missing_docs, clippy::pedantic)]

mod context;
mod error;
mod lifecycle;
mod orchestrator;
mod rewriter;

pub use context::{
    COMPACTION_THRESHOLD, ContextManager, MAX_SUMMARY_TOKENS, RECENT_WINDOW, TurnContext,
};
pub use error::{TurnError, TurnResult};
pub use lifecycle::{LifecycleError, TurnLifecycle, TurnPhase};
pub use orchestrator::{
    TurnEvent, TurnOrchestrator, TurnOrchestratorBuilder, TurnRequest, TurnStream,
};
pub use rewriter::QueryRewriter;

use chat_memory::Message;
use chat_prompts::PromptMessage;

/// Projects stored messages into prompt messages.
pub(crate) fn prompt_messages(messages: &[Message]) -> Vec<PromptMessage> {
    messages
        .iter()
        .map(|message| PromptMessage::new(message.role(), message.content()))
        .collect()
}
