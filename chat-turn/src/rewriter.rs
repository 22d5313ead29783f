//! Standalone search-query rewriting.

use std::sync::Arc;

use chat_prompts::{PromptMessage, templates};
use chat_providers::traits::LlmProvider;
use tracing::debug;

/// Number of trailing messages supplied as rewriting context.
const REWRITE_WINDOW: usize = 4;

/// Token budget for the rewritten query.
const REWRITE_MAX_TOKENS: u32 = 100;

/// Rewrites ambiguous follow-up messages into standalone search queries.
///
/// Rewriting is a quality enhancement, never a hard dependency: any provider
/// failure or empty result falls back silently to the original message.
#[derive(Clone)]
pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
}

impl QueryRewriter {
    /// Creates a rewriter over the given model.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Returns the search query for the message: the model's standalone
    /// rewrite when history exists and the rewrite succeeds, the original
    /// message otherwise.
    pub async fn rewrite(&self, message: &str, recent: &[PromptMessage]) -> String {
        if recent.is_empty() {
            return message.to_owned();
        }

        let window = &recent[recent.len().saturating_sub(REWRITE_WINDOW)..];
        let prompt = templates::rewrite_prompt(&templates::transcript(window), message);

        match self.llm.generate(&prompt, REWRITE_MAX_TOKENS).await {
            Ok(rewritten) => {
                let rewritten = rewritten.trim();
                if rewritten.is_empty() {
                    message.to_owned()
                } else {
                    debug!(original = message, rewritten, "query rewritten");
                    rewritten.to_owned()
                }
            }
            Err(err) => {
                debug!(error = %err, "query rewrite failed; using original message");
                message.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chat_primitives::MessageRole;
    use chat_providers::traits::{ProviderError, ProviderMetadata, ProviderResult, TokenStream};
    use std::sync::Mutex;

    struct StubLlm {
        metadata: ProviderMetadata,
        result: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl StubLlm {
        fn ok(response: &str) -> Arc<Self> {
            Arc::new(Self {
                metadata: ProviderMetadata::new("test", "static"),
                result: Ok(response.to_owned()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                metadata: ProviderMetadata::new("test", "static"),
                result: Err(()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn metadata(&self) -> &ProviderMetadata {
            &self.metadata
        }

        async fn generate(&self, prompt: &str, _max_tokens: u32) -> ProviderResult<String> {
            self.prompts
                .lock()
                .expect("prompts poisoned")
                .push(prompt.to_owned());
            self.result
                .clone()
                .map_err(|()| ProviderError::transport("unavailable"))
        }

        async fn stream_generate(
            &self,
            _messages: Vec<PromptMessage>,
        ) -> ProviderResult<TokenStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    fn history(len: usize) -> Vec<PromptMessage> {
        (0..len)
            .map(|i| PromptMessage::new(MessageRole::User, format!("message {i}")))
            .collect()
    }

    #[tokio::test]
    async fn fresh_conversations_skip_rewriting() {
        let llm = StubLlm::ok("should not be used");
        let rewriter = QueryRewriter::new(llm.clone());

        let query = rewriter.rewrite("what is the policy?", &[]).await;
        assert_eq!(query, "what is the policy?");
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rewrites_with_trailing_context() {
        let llm = StubLlm::ok("  refund policy for electronics  ");
        let rewriter = QueryRewriter::new(llm.clone());

        let query = rewriter.rewrite("what about electronics?", &history(6)).await;
        assert_eq!(query, "refund policy for electronics");

        let prompts = llm.prompts.lock().unwrap();
        // Only the last four messages make it into the prompt.
        assert!(!prompts[0].contains("message 1"));
        assert!(prompts[0].contains("message 2"));
        assert!(prompts[0].contains("message 5"));
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_the_original() {
        let rewriter = QueryRewriter::new(StubLlm::failing());
        let query = rewriter.rewrite("original question", &history(2)).await;
        assert_eq!(query, "original question");
    }

    #[tokio::test]
    async fn empty_rewrite_falls_back_to_the_original() {
        let rewriter = QueryRewriter::new(StubLlm::ok("   "));
        let query = rewriter.rewrite("original question", &history(2)).await;
        assert_eq!(query, "original question");
    }
}
