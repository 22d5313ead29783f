//! Error types for the knowledge subsystem.

use chat_memory::MemoryError;
use thiserror::Error;

/// Errors emitted by ingestion and retrieval.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The document contained no usable text after sanitization.
    #[error("document contains no usable text")]
    EmptyDocument,

    /// The splitter configuration was invalid.
    #[error("invalid splitter configuration: {0}")]
    InvalidConfig(&'static str),

    /// A memory-layer dependency (embeddings, vector index) failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Result alias for knowledge operations.
pub type KnowledgeResult<T> = Result<T, KnowledgeError>;
