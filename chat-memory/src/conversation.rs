//! Conversation and message model.
//!
//! Messages are append-only and immutable once added; insertion order is
//! semantic and never changes. A turn appends exactly two messages (user and
//! assistant) in a single store operation, or none at all.

use chat_primitives::{ConversationId, MessageRole, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vector_index::Partition;
use crate::{MemoryError, MemoryResult};

/// Truncated reference to a retrieved chunk, persisted with the assistant
/// message that used it. The full chunk text is transient per turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRef {
    text: String,
    score: f32,
    source: Partition,
    file_name: String,
}

impl ChunkRef {
    /// Maximum number of characters of chunk text kept in message metadata.
    pub const MAX_TEXT_CHARS: usize = 200;

    /// Creates a chunk reference, truncating the text for storage.
    #[must_use]
    pub fn new(text: &str, score: f32, source: Partition, file_name: impl Into<String>) -> Self {
        Self {
            text: text.chars().take(Self::MAX_TEXT_CHARS).collect(),
            score,
            source,
            file_name: file_name.into(),
        }
    }

    /// Returns the truncated chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the weighted similarity score the chunk ranked with.
    #[must_use]
    pub const fn score(&self) -> f32 {
        self.score
    }

    /// Returns the partition the chunk was retrieved from.
    #[must_use]
    pub const fn source(&self) -> Partition {
        self.source
    }

    /// Returns the originating file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Metadata attached to assistant messages describing how they were grounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    #[serde(default)]
    retrieved_chunks: Vec<ChunkRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_used: Option<String>,
}

impl MessageMetadata {
    /// Creates metadata from the chunks used for grounding and the model id.
    #[must_use]
    pub fn new(retrieved_chunks: Vec<ChunkRef>, model_used: impl Into<String>) -> Self {
        Self {
            retrieved_chunks,
            model_used: Some(model_used.into()),
        }
    }

    /// Returns the chunk references recorded for the message.
    #[must_use]
    pub fn retrieved_chunks(&self) -> &[ChunkRef] {
        &self.retrieved_chunks
    }

    /// Returns the identifier of the model that produced the message.
    #[must_use]
    pub fn model_used(&self) -> Option<&str> {
        self.model_used.as_deref()
    }
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    role: MessageRole,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<MessageMetadata>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a message with the supplied role and content.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Attaches grounding metadata to the message.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns the author role.
    #[must_use]
    pub const fn role(&self) -> MessageRole {
        self.role
    }

    /// Returns the message content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the grounding metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&MessageMetadata> {
        self.metadata.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Maximum number of characters from the first message used as a title.
const TITLE_CHARS: usize = 50;

/// A conversation owned by a tenant.
///
/// Holds the ordered message log, the running summary produced by context
/// compaction, and an optimistic-concurrency version that every mutation
/// increments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    tenant_id: TenantId,
    title: String,
    messages: Vec<Message>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    summary_up_to_index: usize,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default)]
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const fn default_active() -> bool {
    true
}

impl Conversation {
    /// Creates an empty conversation for the tenant, titled from the opening
    /// message.
    #[must_use]
    pub fn new(tenant_id: TenantId, opening_message: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::random(),
            tenant_id,
            title: opening_message.chars().take(TITLE_CHARS).collect(),
            messages: Vec::new(),
            summary: String::new(),
            summary_up_to_index: 0,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub const fn id(&self) -> ConversationId {
        self.id
    }

    /// Returns the owning tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the conversation title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the ordered message log.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the running summary (empty before the first compaction).
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns the index up to which messages have been summarized.
    #[must_use]
    pub const fn summary_up_to_index(&self) -> usize {
        self.summary_up_to_index
    }

    /// Returns whether the conversation is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the optimistic-concurrency version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-modified timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Appends a single message. Store implementations use this to rebuild
    /// state; turn commits go through [`Conversation::apply_turn`].
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Appends a completed turn: the user question and the assistant answer,
    /// as one mutation with a single version bump.
    pub fn apply_turn(&mut self, user: Message, assistant: Message) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.touch();
    }

    /// Replaces the running summary and advances the summarized index.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidRecord`] when the new index would move
    /// backwards or past the end of the message log. The summarized index is
    /// monotonically non-decreasing.
    pub fn apply_summary(
        &mut self,
        summary: impl Into<String>,
        up_to_index: usize,
    ) -> MemoryResult<()> {
        if up_to_index < self.summary_up_to_index {
            return Err(MemoryError::InvalidRecord(
                "summary index must not decrease",
            ));
        }
        if up_to_index > self.messages.len() {
            return Err(MemoryError::InvalidRecord(
                "summary index exceeds message count",
            ));
        }
        self.summary = summary.into();
        self.summary_up_to_index = up_to_index;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_truncates_long_messages() {
        let long = "x".repeat(200);
        let conversation = Conversation::new(TenantId::random(), &long);
        assert_eq!(conversation.title().chars().count(), 50);
    }

    #[test]
    fn apply_turn_bumps_version_once() {
        let mut conversation = Conversation::new(TenantId::random(), "hello");
        conversation.apply_turn(
            Message::new(MessageRole::User, "hello"),
            Message::new(MessageRole::Assistant, "hi"),
        );
        assert_eq!(conversation.message_count(), 2);
        assert_eq!(conversation.version(), 1);
    }

    #[test]
    fn summary_index_never_decreases() {
        let mut conversation = Conversation::new(TenantId::random(), "hello");
        for i in 0..6 {
            conversation.push_message(Message::new(MessageRole::User, format!("m{i}")));
        }
        conversation.apply_summary("so far", 4).unwrap();
        assert_eq!(conversation.summary_up_to_index(), 4);

        let err = conversation
            .apply_summary("regressed", 2)
            .expect_err("regression must fail");
        assert!(matches!(err, MemoryError::InvalidRecord(_)));
        assert_eq!(conversation.summary(), "so far");
    }

    #[test]
    fn summary_index_bounded_by_messages() {
        let mut conversation = Conversation::new(TenantId::random(), "hello");
        conversation.push_message(Message::new(MessageRole::User, "one"));
        let err = conversation
            .apply_summary("too far", 5)
            .expect_err("out of range must fail");
        assert!(matches!(err, MemoryError::InvalidRecord(_)));
    }

    #[test]
    fn chunk_ref_truncates_text() {
        let long = "y".repeat(500);
        let chunk = ChunkRef::new(&long, 0.9, Partition::User, "notes.md");
        assert_eq!(chunk.text().chars().count(), ChunkRef::MAX_TEXT_CHARS);
        assert_eq!(chunk.file_name(), "notes.md");
    }
}
