//! Production-grade Google Gemini provider.
//!
//! Non-streaming generation goes through `:generateContent`; the main answer
//! path streams over `:streamGenerateContent` with SSE framing.

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use chat_primitives::MessageRole;
use chat_prompts::PromptMessage;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use hyper::Uri;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client, post_json, read_json, sanitize_base_url};
use crate::traits::{LlmProvider, ProviderError, ProviderMetadata, ProviderResult, TokenStream};

/// Environment variable used when loading configuration automatically.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

const PROVIDER: &str = "gemini";

/// Configuration for the Gemini provider.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl GeminiConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com/".to_owned(),
            timeout: Duration::from_secs(60),
            default_temperature: None,
        }
    }

    /// Loads the API key from the `GEMINI_API_KEY` environment variable,
    /// using the default model.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::new(DEFAULT_GEMINI_MODEL);
        cfg.api_key = env::var(GEMINI_API_KEY_ENV).ok();
        cfg
    }

    /// Overrides the base URL used for API calls.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> ProviderResult<Self> {
        self.base_url = sanitize_base_url(base_url.as_ref(), PROVIDER)?;
        Ok(self)
    }

    /// Sets the default sampling temperature used when requests omit it.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Google Gemini provider that calls the official API over HTTPS.
pub struct GeminiProvider {
    client: HyperClient,
    base_url: String,
    metadata: ProviderMetadata,
    api_key: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.metadata.model())
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Constructs a new provider with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] if the API key is missing.
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .ok_or_else(|| ProviderError::configuration("Gemini provider requires an API key"))?;

        let metadata = ProviderMetadata::new(PROVIDER, config.model.clone());
        let client = build_https_client()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            metadata,
            api_key,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
        })
    }

    fn endpoint(&self, action: &str, sse: bool) -> ProviderResult<Uri> {
        let alt = if sse { "alt=sse&" } else { "" };
        format!(
            "{}v1beta/models/{}:{action}?{alt}key={}",
            self.base_url,
            self.metadata.model(),
            self.api_key
        )
        .parse::<Uri>()
        .map_err(|err| ProviderError::configuration(format!("invalid Gemini endpoint: {err}")))
    }

    fn build_chat_request(
        &self,
        messages: &[PromptMessage],
    ) -> ProviderResult<GenerateContentRequest> {
        if messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "generation requires at least one message",
            ));
        }

        // Gemini carries the system prompt in a separate parameter.
        let system_instruction = messages
            .iter()
            .find(|message| message.role() == MessageRole::System)
            .map(|message| SystemInstruction {
                parts: vec![Part {
                    text: message.content().to_owned(),
                }],
            });

        let contents: Vec<Content> = messages
            .iter()
            .filter(|message| message.role() != MessageRole::System)
            .map(map_prompt_message)
            .collect();

        if contents.is_empty() {
            return Err(ProviderError::invalid_request(
                "generation requires a non-system message",
            ));
        }

        let generation_config = self.default_temperature.map(|temperature| GenerationConfig {
            temperature: Some(temperature),
            max_output_tokens: None,
        });

        Ok(GenerateContentRequest {
            system_instruction,
            contents,
            generation_config,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> ProviderResult<String> {
        let payload = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![Part {
                    text: prompt.to_owned(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.default_temperature,
                max_output_tokens: Some(max_tokens),
            }),
        };

        let endpoint = self.endpoint("generateContent", false)?;
        let response = post_json(&self.client, endpoint, &payload, self.timeout, PROVIDER).await?;
        let response: GenerateContentResponse = read_json(response, PROVIDER).await?;

        Ok(extract_text(response))
    }

    async fn stream_generate(&self, messages: Vec<PromptMessage>) -> ProviderResult<TokenStream> {
        let payload = self.build_chat_request(&messages)?;
        let endpoint = self.endpoint("streamGenerateContent", true)?;
        debug!(
            model = self.metadata.model(),
            messages = messages.len(),
            "starting streamed generation"
        );
        let response = post_json(&self.client, endpoint, &payload, self.timeout, PROVIDER).await?;

        let events = response.into_body().eventsource();
        let stream = events.filter_map(|event| async move {
            match event {
                Ok(event) => match serde_json::from_str::<GenerateContentResponse>(&event.data) {
                    Ok(chunk) => {
                        let text = extract_text(chunk);
                        if text.is_empty() {
                            None
                        } else {
                            Some(Ok(text))
                        }
                    }
                    Err(err) => Some(Err(ProviderError::response(format!(
                        "failed to decode Gemini stream chunk: {err}"
                    )))),
                },
                Err(err) => Some(Err(ProviderError::transport(format!(
                    "Gemini stream failed: {err}"
                )))),
            }
        });

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

fn extract_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .map(|part| part.text)
        .collect::<Vec<_>>()
        .join("")
}

fn map_prompt_message(message: &PromptMessage) -> Content {
    // Gemini uses "model" instead of "assistant".
    let role = match message.role() {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::System => "user",
    };

    Content {
        role: role.to_owned(),
        parts: vec![Part {
            text: message.content().to_owned(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(GeminiConfig::new(DEFAULT_GEMINI_MODEL).with_api_key("test_key"))
            .expect("provider")
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = GeminiProvider::new(GeminiConfig::new(DEFAULT_GEMINI_MODEL))
            .expect_err("missing key should error");
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = GeminiConfig::new(DEFAULT_GEMINI_MODEL)
            .with_base_url("generativelanguage.googleapis.com")
            .expect_err("missing scheme should error");
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }

    #[test]
    fn chat_request_extracts_system_instruction() {
        let request = provider()
            .build_chat_request(&[
                PromptMessage::new(MessageRole::System, "You are helpful"),
                PromptMessage::new(MessageRole::User, "hello"),
            ])
            .expect("request");

        assert!(request.system_instruction.is_some());
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role, "user");
    }

    #[test]
    fn chat_request_maps_assistant_to_model_role() {
        let request = provider()
            .build_chat_request(&[
                PromptMessage::new(MessageRole::User, "hello"),
                PromptMessage::new(MessageRole::Assistant, "hi"),
                PromptMessage::new(MessageRole::User, "follow up"),
            ])
            .expect("request");

        assert_eq!(request.contents[1].role, "model");
        assert_eq!(request.contents[1].parts[0].text, "hi");
    }

    #[test]
    fn chat_request_rejects_empty_messages() {
        let err = provider()
            .build_chat_request(&[])
            .expect_err("empty messages should error");
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));
    }

    #[test]
    fn chat_request_rejects_system_only_messages() {
        let err = provider()
            .build_chat_request(&[PromptMessage::new(MessageRole::System, "only system")])
            .expect_err("system-only should error");
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));
    }

    #[test]
    fn response_parsing_joins_candidate_parts() {
        let json = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "Hello" }, { "text": " world" } ] } }
            ]
        }"#;

        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(parsed), "Hello world");
    }

    #[test]
    fn response_parsing_tolerates_empty_candidates() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(parsed), "");
    }

    #[test]
    fn stream_endpoint_uses_sse_framing() {
        let endpoint = provider()
            .endpoint("streamGenerateContent", true)
            .expect("endpoint");
        let rendered = endpoint.to_string();
        assert!(rendered.contains("streamGenerateContent?alt=sse&key="));
    }
}
