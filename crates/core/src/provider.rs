//! Provider trait: the abstraction over language-model and embedding backends.
//!
//! A Provider knows how to send a prompt to an LLM and get text back, and
//! how to turn text into an embedding vector. Handlers only ever see this
//! call contract, never a concrete backend.
//!
//! Implementations: OpenAI-compatible HTTP, a primary/backup fallback chain,
//! and an offline mock.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// The role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    pub messages: Vec<PromptMessage>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The model to use for embeddings (e.g., "text-embedding-3-small").
    pub model: String,

    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,
}

/// The core Provider trait.
///
/// Every backend implements `complete()`; `generate()` and `embed_one()`
/// are the narrow call contracts the handlers use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation returns an error indicating embeddings aren't supported.
    async fn embed(
        &self,
        _request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            format!("Provider '{}' does not support embeddings", self.name()),
        ))
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }

    /// Run `request` bounded by `timeout` and return the generated text.
    ///
    /// An elapsed timeout becomes `ProviderError::Timeout`.
    async fn generate(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> std::result::Result<String, ProviderError> {
        match tokio::time::timeout(timeout, self.complete(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(format!(
                "'{}' did not answer within {}s",
                self.name(),
                timeout.as_secs_f64()
            ))),
        }
    }

    /// Embed a single text, bounded by `timeout`.
    async fn embed_one(
        &self,
        model: &str,
        text: &str,
        timeout: Duration,
    ) -> std::result::Result<Vec<f32>, ProviderError> {
        let request = EmbeddingRequest {
            model: model.to_string(),
            inputs: vec![text.to_string()],
        };
        let response = match tokio::time::timeout(timeout, self.embed(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProviderError::Timeout(format!(
                    "'{}' did not embed within {}s",
                    self.name(),
                    timeout.as_secs_f64()
                )));
            }
        };
        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".into()))
    }
}
