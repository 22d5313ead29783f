//! Conversation persistence and retrieval-memory seams for the chat runtime.
//!
//! The conversation store is the single source of truth for per-conversation
//! state; orchestration code holds a transient copy per turn and never caches
//! it across turns. Vector index and embedding provider traits abstract the
//! retrieval backends.

#![warn(missing_docs, clippy::pedantic)]

mod conversation;
mod embeddings;
mod error;
mod store;
mod vector_index;

pub use conversation::{ChunkRef, Conversation, Message, MessageMetadata};
pub use embeddings::{EmbeddingKind, EmbeddingProvider, EmbeddingVector};
pub use error::{MemoryError, MemoryResult};
pub use store::{ConversationOverview, ConversationStore, InMemoryConversationStore};
pub use vector_index::{
    ChunkPayload, LocalVectorIndex, Partition, ScoredChunk, VectorIndex, VectorRecord,
};
