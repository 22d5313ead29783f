//! Error types for the memory subsystem.

use chat_primitives::ConversationId;
use thiserror::Error;

/// Errors emitted by memory components.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A conversation or vector record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),

    /// The referenced conversation does not exist.
    #[error("conversation {conversation} not found")]
    NotFound {
        /// Identifier that failed to resolve.
        conversation: ConversationId,
    },

    /// An optimistic update lost the race against a concurrent writer.
    #[error("conversation {conversation} was modified concurrently")]
    VersionConflict {
        /// Identifier of the contested conversation.
        conversation: ConversationId,
    },

    /// The embedding provider reported a failure.
    #[error("embedding failed: {reason}")]
    Embedding {
        /// Human-readable reason describing the failure.
        reason: String,
    },

    /// The vector index backend reported a failure.
    #[error("vector index error: {reason}")]
    VectorIndex {
        /// Human-readable reason describing the failure.
        reason: String,
    },

    /// The conversation store backend reported a failure.
    #[error("conversation store error: {reason}")]
    Backend {
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

impl MemoryError {
    /// Helper to construct embedding errors from string-like values.
    #[must_use]
    pub fn embedding(reason: impl Into<String>) -> Self {
        Self::Embedding {
            reason: reason.into(),
        }
    }

    /// Helper to construct vector index errors from string-like values.
    #[must_use]
    pub fn vector_index(reason: impl Into<String>) -> Self {
        Self::VectorIndex {
            reason: reason.into(),
        }
    }

    /// Helper to construct store backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
