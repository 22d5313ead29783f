//! Error taxonomy for turn orchestration.

use chat_knowledge::KnowledgeError;
use chat_memory::MemoryError;
use chat_providers::traits::ProviderError;
use thiserror::Error;

/// Generic failure text shown to end users. Operator-facing detail travels
/// through `tracing` instead.
const GENERIC_FAILURE: &str =
    "Something went wrong while generating a response. Please try again.";

/// Errors emitted by the turn pipeline.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The referenced conversation is absent or owned by another tenant.
    #[error("conversation not found")]
    NotFound,

    /// The orchestrator builder was missing a required dependency.
    #[error("orchestrator not configured: {0}")]
    Configuration(&'static str),

    /// Conversation store or memory-layer failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Retrieval or ingestion failure.
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    /// Model provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl TurnError {
    /// Collapses the error into boundary-safe, user-facing text. Dependency
    /// failures are deliberately generic; diagnosing detail is logged, not
    /// surfaced.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "Conversation not found.",
            Self::Configuration(_) | Self::Memory(_) | Self::Knowledge(_) | Self::Provider(_) => {
                GENERIC_FAILURE
            }
        }
    }

    /// Returns the generic user-facing failure text.
    #[must_use]
    pub const fn generic_user_message() -> &'static str {
        GENERIC_FAILURE
    }
}

/// Result alias for turn operations.
pub type TurnResult<T> = Result<T, TurnError>;
