//! The conversation turn pipeline.

use std::sync::Arc;

use async_stream::stream;
use chat_guardrails::GuardrailValidator;
use chat_knowledge::{RetrievalMerger, RetrievedChunk};
use chat_memory::{
    ChunkRef, Conversation, ConversationStore, Message, MessageMetadata,
};
use chat_primitives::{ConversationId, MessageRole, TenantId};
use chat_prompts::{ContextSource, PromptAssembler, PromptMessage};
use chat_providers::traits::LlmProvider;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::context::ContextManager;
use crate::lifecycle::{TurnLifecycle, TurnPhase};
use crate::rewriter::QueryRewriter;
use crate::{TurnError, TurnResult, prompt_messages};

/// Externally visible turn events, in wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TurnEvent {
    /// One generated fragment, emitted as soon as it arrives.
    Token {
        /// The fragment text.
        content: String,
    },
    /// The turn completed and was committed.
    Done {
        /// Identifier of the conversation the turn belongs to.
        #[serde(rename = "conversationId")]
        conversation_id: ConversationId,
    },
    /// The turn was rejected or failed; no further events follow.
    Error {
        /// User-safe description of what happened.
        content: String,
    },
}

/// Lazy sequence of turn events. Zero or more tokens followed by exactly one
/// `done` or `error`. Dropping the stream cancels in-flight generation; an
/// incomplete response is never persisted.
pub type TurnStream = std::pin::Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// Input for one conversation turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    tenant_id: TenantId,
    conversation_id: Option<ConversationId>,
    message: String,
}

impl TurnRequest {
    /// Creates a request that starts a new conversation.
    #[must_use]
    pub fn new(tenant_id: TenantId, message: impl Into<String>) -> Self {
        Self {
            tenant_id,
            conversation_id: None,
            message: message.into(),
        }
    }

    /// Continues an existing conversation.
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Returns the requesting tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the targeted conversation, if any.
    #[must_use]
    pub const fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
    }

    /// Returns the user message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

struct PreparedTurn {
    conversation: Conversation,
    prompt: Vec<PromptMessage>,
    chunks: Vec<RetrievedChunk>,
}

/// Builder for [`TurnOrchestrator`].
#[derive(Default)]
pub struct TurnOrchestratorBuilder {
    store: Option<Arc<dyn ConversationStore>>,
    llm: Option<Arc<dyn LlmProvider>>,
    retrieval: Option<Arc<RetrievalMerger>>,
    guardrails: Option<GuardrailValidator>,
    assembler: Option<PromptAssembler>,
}

impl TurnOrchestratorBuilder {
    /// Installs the conversation store. Required.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Installs the generation provider. Required.
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Installs the retrieval merger. Required.
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: Arc<RetrievalMerger>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Overrides the guardrail validator.
    #[must_use]
    pub fn with_guardrails(mut self, guardrails: GuardrailValidator) -> Self {
        self.guardrails = Some(guardrails);
        self
    }

    /// Overrides the prompt assembler.
    #[must_use]
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Configuration`] when a required dependency is
    /// missing.
    pub fn build(self) -> TurnResult<TurnOrchestrator> {
        let store = self
            .store
            .ok_or(TurnError::Configuration("conversation store is required"))?;
        let llm = self
            .llm
            .ok_or(TurnError::Configuration("generation provider is required"))?;
        let retrieval = self
            .retrieval
            .ok_or(TurnError::Configuration("retrieval merger is required"))?;

        let context = Arc::new(ContextManager::new(Arc::clone(&store), Arc::clone(&llm)));
        let rewriter = QueryRewriter::new(Arc::clone(&llm));

        Ok(TurnOrchestrator {
            store,
            llm,
            retrieval,
            context,
            rewriter,
            guardrails: self.guardrails.unwrap_or_default(),
            assembler: self.assembler.unwrap_or_default(),
        })
    }
}

/// Orchestrates one conversation turn end to end.
#[derive(Clone)]
pub struct TurnOrchestrator {
    store: Arc<dyn ConversationStore>,
    llm: Arc<dyn LlmProvider>,
    retrieval: Arc<RetrievalMerger>,
    context: Arc<ContextManager>,
    rewriter: QueryRewriter,
    guardrails: GuardrailValidator,
    assembler: PromptAssembler,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator").finish_non_exhaustive()
    }
}

impl TurnOrchestrator {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::default()
    }

    /// Returns the context manager, for callers that schedule compaction out
    /// of band.
    #[must_use]
    pub fn context_manager(&self) -> &Arc<ContextManager> {
        &self.context
    }

    /// Runs one turn, returning the lazy event stream.
    ///
    /// The stream emits zero or more `token` events followed by exactly one
    /// `done` or `error`. Nothing is persisted unless generation ran to
    /// completion; the commit appends the user and assistant messages
    /// atomically.
    #[must_use]
    pub fn turn(&self, request: TurnRequest) -> TurnStream {
        let this = self.clone();

        Box::pin(stream! {
            let mut lifecycle = TurnLifecycle::new();

            let verdict = this.guardrails.validate_input(request.message());
            if !verdict.is_safe() {
                advance(&mut lifecycle, TurnPhase::Rejected);
                warn!(tenant = %request.tenant_id(), "turn rejected by input guardrail");
                yield TurnEvent::Error {
                    content: verdict.reason().unwrap_or("Please enter a message.").to_owned(),
                };
                return;
            }

            let prepared = match this.prepare(&request, &mut lifecycle).await {
                Ok(prepared) => prepared,
                Err(err) => {
                    advance(&mut lifecycle, TurnPhase::Failed);
                    warn!(tenant = %request.tenant_id(), error = %err, "turn failed before generation");
                    yield TurnEvent::Error { content: err.user_message().to_owned() };
                    return;
                }
            };
            let PreparedTurn { conversation, prompt, chunks } = prepared;

            advance(&mut lifecycle, TurnPhase::Generating);
            let mut tokens = match this.llm.stream_generate(prompt).await {
                Ok(tokens) => tokens,
                Err(err) => {
                    advance(&mut lifecycle, TurnPhase::Failed);
                    warn!(conversation = %conversation.id(), error = %err, "generation could not start");
                    yield TurnEvent::Error {
                        content: TurnError::generic_user_message().to_owned(),
                    };
                    return;
                }
            };

            let mut response = String::new();
            let mut stream_error = None;
            while let Some(fragment) = tokens.next().await {
                match fragment {
                    Ok(token) => {
                        response.push_str(&token);
                        yield TurnEvent::Token { content: token };
                    }
                    Err(err) => {
                        stream_error = Some(err);
                        break;
                    }
                }
            }

            if let Some(err) = stream_error {
                advance(&mut lifecycle, TurnPhase::Failed);
                error!(
                    conversation = %conversation.id(),
                    error = %err,
                    streamed_chars = response.len(),
                    "generation failed mid-stream; turn not persisted"
                );
                yield TurnEvent::Error {
                    content: TurnError::generic_user_message().to_owned(),
                };
                return;
            }

            // Advisory leak check on the buffered response. Streamed tokens
            // cannot be recalled; the replacement is what gets persisted so
            // the leak is not replayed into future prompts.
            let output_verdict = this.guardrails.validate_output(&response);
            let stored_response = if output_verdict.is_safe() {
                response
            } else {
                warn!(
                    conversation = %conversation.id(),
                    "response tripped the leak filter; persisting the replacement"
                );
                output_verdict.replacement().unwrap_or_default().to_owned()
            };

            advance(&mut lifecycle, TurnPhase::Persisting);
            let chunk_refs = chunks
                .iter()
                .map(|chunk| {
                    ChunkRef::new(chunk.text(), chunk.score(), chunk.source(), chunk.file_name())
                })
                .collect();
            let user_message = Message::new(MessageRole::User, request.message());
            let assistant_message = Message::new(MessageRole::Assistant, stored_response)
                .with_metadata(MessageMetadata::new(chunk_refs, this.llm.metadata().model()));

            if let Err(err) = this
                .store
                .append_turn(conversation.id(), user_message, assistant_message)
                .await
            {
                advance(&mut lifecycle, TurnPhase::Failed);
                // The answer already reached the caller; this is the silent
                // data-loss path and must be loud in the logs.
                error!(
                    conversation = %conversation.id(),
                    error = %err,
                    "answer was delivered but the turn could not be persisted"
                );
                yield TurnEvent::Error {
                    content: TurnError::from(err).user_message().to_owned(),
                };
                return;
            }

            advance(&mut lifecycle, TurnPhase::Compacting);
            if let Err(err) = this.context.compact_if_needed(conversation.id()).await {
                warn!(
                    conversation = %conversation.id(),
                    error = %err,
                    "compaction failed; will be retried on a later turn"
                );
            }

            advance(&mut lifecycle, TurnPhase::Done);
            yield TurnEvent::Done { conversation_id: conversation.id() };
        })
    }

    async fn prepare(
        &self,
        request: &TurnRequest,
        lifecycle: &mut TurnLifecycle,
    ) -> TurnResult<PreparedTurn> {
        advance(lifecycle, TurnPhase::ContextLoading);
        let conversation = match request.conversation_id() {
            Some(id) => self
                .store
                .find_for_tenant(id, request.tenant_id())
                .await?
                .ok_or(TurnError::NotFound)?,
            None => {
                self.store
                    .create(Conversation::new(request.tenant_id(), request.message()))
                    .await?
            }
        };
        let context = self.context.get_context(&conversation);
        let recent = prompt_messages(context.recent_messages());

        advance(lifecycle, TurnPhase::Rewriting);
        let query = self.rewriter.rewrite(request.message(), &recent).await;

        advance(lifecycle, TurnPhase::Retrieving);
        let chunks = self.retrieval.retrieve(&query, request.tenant_id()).await?;
        debug!(
            conversation = %conversation.id(),
            retrieved = chunks.len(),
            "retrieval complete"
        );

        let sources: Vec<ContextSource> = chunks
            .iter()
            .map(|chunk| ContextSource::new(chunk.file_name(), chunk.text()))
            .collect();
        let prompt = self
            .assembler
            .assemble(context.summary(), &sources, &recent, request.message());

        Ok(PreparedTurn {
            conversation,
            prompt,
            chunks,
        })
    }
}

/// Applies a lifecycle transition. Transitions are statically sequenced by
/// the pipeline, so a rejection here indicates a pipeline bug; it is logged
/// rather than surfaced.
fn advance(lifecycle: &mut TurnLifecycle, phase: TurnPhase) {
    if let Err(err) = lifecycle.advance(phase) {
        warn!(error = %err, "turn lifecycle out of sync");
    }
}
