//! `Ollama` embedding provider.
//!
//! Serves the asymmetric embedding contract: queries and documents receive
//! the prefixes the `nomic-embed-text` family is trained with.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use chat_memory::{EmbeddingKind, EmbeddingProvider, EmbeddingVector, MemoryError, MemoryResult};
use hyper::Uri;
use serde::{Deserialize, Serialize};

use crate::http_client::{HyperClient, build_https_client, post_json, read_json, sanitize_base_url};
use crate::traits::ProviderResult;

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

const PROVIDER: &str = "ollama";

const DOCUMENT_PREFIX: &str = "search_document: ";
const QUERY_PREFIX: &str = "search_query: ";

/// Configuration for the Ollama embedding provider.
#[derive(Clone, Debug)]
pub struct OllamaEmbeddingsConfig {
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbeddingsConfig {
    /// Creates a configuration for the supplied model using default settings.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/".to_owned(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the base URL of the local Ollama daemon.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> ProviderResult<Self> {
        self.base_url = sanitize_base_url(base_url.as_ref(), PROVIDER)?;
        Ok(self)
    }

    /// Sets the HTTP timeout for requests to the Ollama daemon.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for OllamaEmbeddingsConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_MODEL)
    }
}

/// Embedding provider backed by a local Ollama daemon.
pub struct OllamaEmbeddings {
    client: HyperClient,
    endpoint: Uri,
    model: String,
    timeout: Duration,
}

impl fmt::Debug for OllamaEmbeddings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaEmbeddings")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaEmbeddings {
    /// Constructs a new provider from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint is invalid or the HTTP
    /// client cannot be constructed.
    pub fn new(config: OllamaEmbeddingsConfig) -> ProviderResult<Self> {
        let endpoint = format!("{}api/embeddings", config.base_url)
            .parse::<Uri>()
            .map_err(|err| {
                crate::traits::ProviderError::configuration(format!(
                    "invalid Ollama endpoint: {err}"
                ))
            })?;

        let client = build_https_client()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model,
            timeout: config.timeout,
        })
    }

    /// Returns the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, text: &str, kind: EmbeddingKind) -> MemoryResult<EmbeddingVector> {
        let payload = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: format!("{}{text}", kind_prefix(kind)),
        };

        let response = post_json(
            &self.client,
            self.endpoint.clone(),
            &payload,
            self.timeout,
            PROVIDER,
        )
        .await
        .map_err(|err| MemoryError::embedding(err.to_string()))?;

        let response: EmbeddingsResponse = read_json(response, PROVIDER)
            .await
            .map_err(|err| MemoryError::embedding(err.to_string()))?;

        if let Some(error) = response.error {
            return Err(MemoryError::embedding(error));
        }

        EmbeddingVector::new(response.embedding)
    }
}

const fn kind_prefix(kind: EmbeddingKind) -> &'static str {
    match kind {
        EmbeddingKind::Document => DOCUMENT_PREFIX,
        EmbeddingKind::Query => QUERY_PREFIX,
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    error: Option<String>,
}
