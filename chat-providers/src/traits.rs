//! Shared provider traits and data structures.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chat_prompts::PromptMessage;
use futures::Stream;
use thiserror::Error;

/// Result alias used by provider adapters.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Lazy sequence of text fragments emitted by [`LlmProvider::stream_generate`].
///
/// The producer suspends between fragments; the consumer drives progress by
/// pulling, so backpressure is bounded by the consumer's pull rate. Dropping
/// the stream cancels the in-flight request.
pub type TokenStream = Pin<Box<dyn Stream<Item = ProviderResult<String>> + Send>>;

/// Error type shared by provider implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider is misconfigured or missing credentials.
    #[error("provider not configured: {reason}")]
    Configuration {
        /// Additional context for the failure.
        reason: String,
    },

    /// The supplied request was invalid for the target model.
    #[error("invalid provider request: {reason}")]
    InvalidRequest {
        /// Reason describing why the request could not be processed.
        reason: String,
    },

    /// Transport-level failures (network, protocol, timeouts).
    #[error("provider transport error: {reason}")]
    Transport {
        /// Additional context about the error.
        reason: String,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("provider rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Suggested delay before retrying.
        retry_after: Option<Duration>,
    },

    /// The provider returned a malformed or failing response.
    #[error("provider response error: {reason}")]
    Response {
        /// Additional context about the response failure.
        reason: String,
    },
}

impl ProviderError {
    /// Convenience constructor for invalid requests.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for configuration issues.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for response failures.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Minimal metadata describing a provider instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderMetadata {
    provider: &'static str,
    model: String,
}

impl ProviderMetadata {
    /// Creates metadata for the supplied provider and model identifier.
    #[must_use]
    pub fn new(provider: &'static str, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Returns the provider identifier (e.g., "gemini").
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Trait implemented by generation providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns basic metadata describing the provider instance.
    fn metadata(&self) -> &ProviderMetadata;

    /// Generates a complete response for a single prompt. Used for query
    /// rewriting and summarization.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> ProviderResult<String>;

    /// Streams a response for a chat-style message list, fragment by
    /// fragment. Used for the main grounded answer.
    async fn stream_generate(&self, messages: Vec<PromptMessage>) -> ProviderResult<TokenStream>;
}
