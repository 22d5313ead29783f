//! Retrieval-grounded conversation runtime facade.
//!
//! Depend on this crate via `cargo add groundline`. It bundles the internal
//! runtime crates behind feature flags so downstream users can enable or
//! disable components as needed.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use chat_primitives as primitives;

/// Guardrail validation (enabled by `guardrails` feature).
#[cfg(feature = "guardrails")]
pub use chat_guardrails as guardrails;

/// Chunking, ingestion, and retrieval merging (enabled by `knowledge` feature).
#[cfg(feature = "knowledge")]
pub use chat_knowledge as knowledge;

/// Conversation store and vector index seams (enabled by `memory` feature).
#[cfg(feature = "memory")]
pub use chat_memory as memory;

/// Prompt assembly and templates (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use chat_prompts as prompts;

/// Model and embedding providers (enabled by `providers` feature).
#[cfg(feature = "providers")]
pub use chat_providers as providers;

/// Turn orchestration (enabled by `turn` feature).
#[cfg(feature = "turn")]
pub use chat_turn as turn;
