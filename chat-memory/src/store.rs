//! Conversation store trait and an in-memory implementation.
//!
//! The store is the serialization point for per-conversation state. Turn
//! commits append two messages atomically; summary updates carry an expected
//! version so concurrent writers are detected instead of silently clobbering
//! each other.

use std::collections::HashMap;

use async_trait::async_trait;
use chat_primitives::{ConversationId, TenantId};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::conversation::{Conversation, Message};
use crate::{MemoryError, MemoryResult};

/// Metadata-only view of a conversation, used for tenant listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOverview {
    id: ConversationId,
    title: String,
    message_count: usize,
    updated_at: DateTime<Utc>,
}

impl ConversationOverview {
    /// Returns the conversation identifier.
    #[must_use]
    pub const fn id(&self) -> ConversationId {
        self.id
    }

    /// Returns the conversation title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the number of messages in the conversation.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.message_count
    }

    /// Returns the last-modified timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl From<&Conversation> for ConversationOverview {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id(),
            title: conversation.title().to_owned(),
            message_count: conversation.message_count(),
            updated_at: conversation.updated_at(),
        }
    }
}

/// Interface for conversation persistence backends.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a newly created conversation and returns the stored copy.
    async fn create(&self, conversation: Conversation) -> MemoryResult<Conversation>;

    /// Looks up a conversation by id, scoped to the owning tenant. Returns
    /// `None` when the conversation is absent or owned by another tenant.
    async fn find_for_tenant(
        &self,
        id: ConversationId,
        tenant: TenantId,
    ) -> MemoryResult<Option<Conversation>>;

    /// Loads a conversation by id.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] when the conversation does not exist.
    async fn load(&self, id: ConversationId) -> MemoryResult<Conversation>;

    /// Appends a completed turn (user question + assistant answer) as a
    /// single atomic mutation. No partial turn is ever visible to readers.
    async fn append_turn(
        &self,
        id: ConversationId,
        user: Message,
        assistant: Message,
    ) -> MemoryResult<Conversation>;

    /// Replaces the running summary and summarized index.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::VersionConflict`] when the stored version no
    /// longer matches `expected_version`, and [`MemoryError::NotFound`] when
    /// the conversation does not exist.
    async fn update_summary(
        &self,
        id: ConversationId,
        summary: String,
        up_to_index: usize,
        expected_version: u64,
    ) -> MemoryResult<Conversation>;

    /// Lists active conversations for a tenant, most recently updated first.
    async fn list_for_tenant(&self, tenant: TenantId) -> MemoryResult<Vec<ConversationOverview>>;
}

/// In-memory conversation store backed by a `tokio` read-write lock.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, conversation: Conversation) -> MemoryResult<Conversation> {
        let mut guard = self.conversations.write().await;
        guard.insert(conversation.id(), conversation.clone());
        Ok(conversation)
    }

    async fn find_for_tenant(
        &self,
        id: ConversationId,
        tenant: TenantId,
    ) -> MemoryResult<Option<Conversation>> {
        let guard = self.conversations.read().await;
        Ok(guard
            .get(&id)
            .filter(|conversation| conversation.tenant_id() == tenant)
            .cloned())
    }

    async fn load(&self, id: ConversationId) -> MemoryResult<Conversation> {
        let guard = self.conversations.read().await;
        guard
            .get(&id)
            .cloned()
            .ok_or(MemoryError::NotFound { conversation: id })
    }

    async fn append_turn(
        &self,
        id: ConversationId,
        user: Message,
        assistant: Message,
    ) -> MemoryResult<Conversation> {
        let mut guard = self.conversations.write().await;
        let conversation = guard
            .get_mut(&id)
            .ok_or(MemoryError::NotFound { conversation: id })?;
        conversation.apply_turn(user, assistant);
        Ok(conversation.clone())
    }

    async fn update_summary(
        &self,
        id: ConversationId,
        summary: String,
        up_to_index: usize,
        expected_version: u64,
    ) -> MemoryResult<Conversation> {
        let mut guard = self.conversations.write().await;
        let conversation = guard
            .get_mut(&id)
            .ok_or(MemoryError::NotFound { conversation: id })?;

        if conversation.version() != expected_version {
            return Err(MemoryError::VersionConflict { conversation: id });
        }

        conversation.apply_summary(summary, up_to_index)?;
        Ok(conversation.clone())
    }

    async fn list_for_tenant(&self, tenant: TenantId) -> MemoryResult<Vec<ConversationOverview>> {
        let guard = self.conversations.read().await;
        let mut overviews: Vec<ConversationOverview> = guard
            .values()
            .filter(|conversation| conversation.tenant_id() == tenant && conversation.is_active())
            .map(ConversationOverview::from)
            .collect();
        overviews.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        Ok(overviews)
    }
}
