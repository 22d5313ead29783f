//! Per-turn context derivation and recursive summarization.
//!
//! Conversations grow without bound; the context manager keeps prompt size
//! bounded by folding older messages into a running summary. Each compaction
//! folds only the messages that arrived since the previous one, so cost stays
//! proportional to new material rather than conversation length.

use std::collections::HashMap;
use std::sync::Arc;

use chat_memory::{Conversation, ConversationStore, MemoryError, Message};
use chat_primitives::ConversationId;
use chat_prompts::templates;
use chat_providers::traits::LlmProvider;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{TurnResult, prompt_messages};

/// Number of most-recent messages always kept verbatim; never summarized.
pub const RECENT_WINDOW: usize = 10;

/// Minimum number of unsummarized messages (beyond the recent window) before
/// compaction fires.
pub const COMPACTION_THRESHOLD: usize = 20;

/// Token budget for the running summary.
pub const MAX_SUMMARY_TOKENS: u32 = 500;

/// Context handed to prompt assembly for one turn.
#[derive(Debug, Clone)]
pub struct TurnContext {
    summary: String,
    recent_messages: Vec<Message>,
}

impl TurnContext {
    /// Returns the running summary; empty when no compaction has happened.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns the recent messages, verbatim, in original order.
    #[must_use]
    pub fn recent_messages(&self) -> &[Message] {
        &self.recent_messages
    }
}

/// Derives per-turn context and runs compaction.
pub struct ContextManager {
    store: Arc<dyn ConversationStore>,
    llm: Arc<dyn LlmProvider>,
    compaction_locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ContextManager {
    /// Creates a context manager over the given store and summarization model.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            store,
            llm,
            compaction_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Derives the context for the current turn.
    ///
    /// Short conversations (at most [`RECENT_WINDOW`] messages) are returned
    /// in full with an empty summary. Longer conversations get the stored
    /// summary plus the last [`RECENT_WINDOW`] messages from the tail.
    #[must_use]
    pub fn get_context(&self, conversation: &Conversation) -> TurnContext {
        let messages = conversation.messages();

        if messages.len() <= RECENT_WINDOW {
            return TurnContext {
                summary: String::new(),
                recent_messages: messages.to_vec(),
            };
        }

        TurnContext {
            summary: conversation.summary().to_owned(),
            recent_messages: messages[messages.len() - RECENT_WINDOW..].to_vec(),
        }
    }

    /// Folds unsummarized history into the running summary when the backlog
    /// crosses [`COMPACTION_THRESHOLD`]. Returns whether compaction fired.
    ///
    /// Compactions on the same conversation are serialized through a
    /// per-conversation lock, and the summary write carries the loaded
    /// version: losing the version race to a concurrent append is benign
    /// (the next turn recomputes the backlog from the stored index) and is
    /// reported as "did not fire".
    ///
    /// # Errors
    ///
    /// Propagates store and summarization failures.
    pub async fn compact_if_needed(&self, id: ConversationId) -> TurnResult<bool> {
        let lock = {
            let mut locks = self.compaction_locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        let _serialized = lock.lock().await;

        let conversation = self.store.load(id).await?;
        let total = conversation.message_count();

        let Some(tail) = total.checked_sub(RECENT_WINDOW) else {
            return Ok(false);
        };
        let unsummarized = tail.saturating_sub(conversation.summary_up_to_index());
        if unsummarized < COMPACTION_THRESHOLD {
            return Ok(false);
        }

        let to_summarize = &conversation.messages()[conversation.summary_up_to_index()..tail];
        let transcript = templates::transcript(&prompt_messages(to_summarize));
        let prompt = templates::summary_prompt(conversation.summary(), &transcript);

        let summary = self.llm.generate(&prompt, MAX_SUMMARY_TOKENS).await?;

        match self
            .store
            .update_summary(id, summary.trim().to_owned(), tail, conversation.version())
            .await
        {
            Ok(_) => {
                info!(
                    conversation = %id,
                    summarized_up_to = tail,
                    folded = unsummarized,
                    "conversation compacted"
                );
                Ok(true)
            }
            Err(MemoryError::VersionConflict { .. }) => {
                debug!(
                    conversation = %id,
                    "compaction lost a version race; deferring to a later turn"
                );
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_memory::{InMemoryConversationStore, MemoryResult};
    use chat_primitives::{MessageRole, TenantId};
    use chat_providers::traits::{ProviderMetadata, ProviderResult, TokenStream};
    use chat_prompts::PromptMessage;
    use std::sync::Mutex as StdMutex;

    struct RecordingLlm {
        metadata: ProviderMetadata,
        response: String,
        prompts: StdMutex<Vec<String>>,
    }

    impl RecordingLlm {
        fn new(response: &str) -> Self {
            Self {
                metadata: ProviderMetadata::new("test", "static"),
                response: response.to_owned(),
                prompts: StdMutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts poisoned").clone()
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        fn metadata(&self) -> &ProviderMetadata {
            &self.metadata
        }

        async fn generate(&self, prompt: &str, _max_tokens: u32) -> ProviderResult<String> {
            self.prompts
                .lock()
                .expect("prompts poisoned")
                .push(prompt.to_owned());
            Ok(self.response.clone())
        }

        async fn stream_generate(
            &self,
            _messages: Vec<PromptMessage>,
        ) -> ProviderResult<TokenStream> {
            let chunk = self.response.clone();
            Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
        }
    }

    fn conversation_with(messages: usize) -> Conversation {
        let mut conversation = Conversation::new(TenantId::random(), "opening message");
        for i in 0..messages {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            conversation.push_message(Message::new(role, format!("message {i}")));
        }
        conversation
    }

    fn manager(store: Arc<dyn ConversationStore>, llm: Arc<RecordingLlm>) -> ContextManager {
        ContextManager::new(store, llm)
    }

    #[tokio::test]
    async fn short_conversations_return_everything_verbatim() {
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("unused"));
        let manager = manager(store, llm);

        let conversation = conversation_with(RECENT_WINDOW);
        let context = manager.get_context(&conversation);

        assert_eq!(context.summary(), "");
        assert_eq!(context.recent_messages().len(), RECENT_WINDOW);
        assert_eq!(context.recent_messages()[0].content(), "message 0");
    }

    #[tokio::test]
    async fn long_conversations_return_summary_and_tail() {
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("unused"));
        let manager = manager(store, llm);

        let mut conversation = conversation_with(25);
        conversation.apply_summary("the story so far", 5).unwrap();
        let context = manager.get_context(&conversation);

        assert_eq!(context.summary(), "the story so far");
        assert_eq!(context.recent_messages().len(), RECENT_WINDOW);
        // Tail comes from the end, in original order.
        assert_eq!(context.recent_messages()[0].content(), "message 15");
        assert_eq!(
            context.recent_messages()[RECENT_WINDOW - 1].content(),
            "message 24"
        );
    }

    #[tokio::test]
    async fn compaction_fires_at_the_documented_boundary() {
        // 31 messages, nothing summarized: 31 - 10 - 0 = 21 >= 20.
        let store = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("compact summary"));
        let manager = manager(store.clone(), Arc::clone(&llm));

        let conversation = store.create(conversation_with(31)).await.unwrap();
        let fired = manager.compact_if_needed(conversation.id()).await.unwrap();
        assert!(fired);

        let reloaded = store.load(conversation.id()).await.unwrap();
        assert_eq!(reloaded.summary(), "compact summary");
        assert_eq!(reloaded.summary_up_to_index(), 21);
    }

    #[tokio::test]
    async fn compaction_noops_below_the_threshold() {
        // 29 messages: 29 - 10 - 0 = 19 < 20.
        let store = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("should not run"));
        let manager = manager(store.clone(), Arc::clone(&llm));

        let conversation = store.create(conversation_with(29)).await.unwrap();
        let fired = manager.compact_if_needed(conversation.id()).await.unwrap();
        assert!(!fired);
        assert!(llm.prompts().is_empty());

        let reloaded = store.load(conversation.id()).await.unwrap();
        assert_eq!(reloaded.summary(), "");
        assert_eq!(reloaded.summary_up_to_index(), 0);
    }

    #[tokio::test]
    async fn compaction_noops_on_tiny_conversations() {
        let store = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("should not run"));
        let manager = manager(store.clone(), Arc::clone(&llm));

        let conversation = store.create(conversation_with(3)).await.unwrap();
        let fired = manager.compact_if_needed(conversation.id()).await.unwrap();
        assert!(!fired);
    }

    #[tokio::test]
    async fn recompaction_folds_into_the_existing_summary() {
        let store = Arc::new(InMemoryConversationStore::new());
        let llm = Arc::new(RecordingLlm::new("updated summary"));
        let manager = manager(store.clone(), Arc::clone(&llm));

        let conversation = store.create(conversation_with(31)).await.unwrap();
        manager.compact_if_needed(conversation.id()).await.unwrap();

        // Grow the conversation until another 20 messages sit outside the
        // window: 51 - 10 - 21 = 20.
        for i in 0..10 {
            store
                .append_turn(
                    conversation.id(),
                    Message::new(MessageRole::User, format!("later q{i}")),
                    Message::new(MessageRole::Assistant, format!("later a{i}")),
                )
                .await
                .unwrap();
        }

        let fired = manager.compact_if_needed(conversation.id()).await.unwrap();
        assert!(fired);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        // The second pass folds new material into the first summary rather
        // than re-summarizing from scratch.
        assert!(prompts[1].contains("updated summary"));
        assert!(!prompts[1].contains("message 0"));

        let reloaded = store.load(conversation.id()).await.unwrap();
        assert_eq!(reloaded.summary_up_to_index(), 41);
    }

    struct ConflictingStore {
        inner: InMemoryConversationStore,
    }

    #[async_trait]
    impl ConversationStore for ConflictingStore {
        async fn create(&self, conversation: Conversation) -> MemoryResult<Conversation> {
            self.inner.create(conversation).await
        }

        async fn find_for_tenant(
            &self,
            id: ConversationId,
            tenant: TenantId,
        ) -> MemoryResult<Option<Conversation>> {
            self.inner.find_for_tenant(id, tenant).await
        }

        async fn load(&self, id: ConversationId) -> MemoryResult<Conversation> {
            self.inner.load(id).await
        }

        async fn append_turn(
            &self,
            id: ConversationId,
            user: Message,
            assistant: Message,
        ) -> MemoryResult<Conversation> {
            self.inner.append_turn(id, user, assistant).await
        }

        async fn update_summary(
            &self,
            id: ConversationId,
            _summary: String,
            _up_to_index: usize,
            _expected_version: u64,
        ) -> MemoryResult<Conversation> {
            Err(MemoryError::VersionConflict { conversation: id })
        }

        async fn list_for_tenant(
            &self,
            tenant: TenantId,
        ) -> MemoryResult<Vec<chat_memory::ConversationOverview>> {
            self.inner.list_for_tenant(tenant).await
        }
    }

    #[tokio::test]
    async fn version_conflicts_are_benign() {
        let store = Arc::new(ConflictingStore {
            inner: InMemoryConversationStore::new(),
        });
        let llm = Arc::new(RecordingLlm::new("a summary"));
        let manager = ContextManager::new(store.clone(), llm.clone());

        let conversation = store.create(conversation_with(31)).await.unwrap();
        let fired = manager.compact_if_needed(conversation.id()).await.unwrap();
        assert!(!fired);
    }
}
