//! Shared test helpers for handler and orchestrator tests.

use std::sync::Mutex;

use switchyard_core::error::ProviderError;
use switchyard_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};
use switchyard_providers::mock::hashed_embedding;

/// A provider that answers completions from a script.
///
/// Each call to `complete` pops the next scripted outcome and records the
/// last user prompt. Embeddings use the same hashed vectors as the mock
/// provider unless `failing_embeddings` is set.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    embed_error: Option<ProviderError>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            prompts: Mutex::new(Vec::new()),
            embed_error: None,
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing_embeddings(mut self, error: ProviderError) -> Self {
        self.embed_error = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Last user prompt of every completion call, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.last_user_content().unwrap_or_default().to_string());

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedProvider: no more scripted replies");
        }
        let content = script.remove(0)?;
        Ok(ProviderResponse {
            content,
            usage: None,
            model: request.model,
        })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if let Some(e) = &self.embed_error {
            return Err(e.clone());
        }
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| hashed_embedding(t)).collect(),
            model: request.model,
        })
    }
}
