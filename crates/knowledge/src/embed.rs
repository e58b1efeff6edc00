//! Embedding with bounded exponential backoff.

use std::time::Duration;

use switchyard_config::KnowledgeConfig;
use switchyard_core::error::{EmbeddingError, ProviderError};
use switchyard_core::provider::{EmbeddingRequest, Provider};
use tracing::warn;

/// How embedding calls are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self {
            max_attempts: config.embed_max_attempts.max(1),
            initial: Duration::from_millis(config.embed_initial_backoff_ms),
            max: Duration::from_millis(config.embed_max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (0-based), doubling and capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Embed `inputs` in one batch, retrying transient failures.
///
/// Non-retryable errors (bad key, malformed request) fail immediately.
pub async fn embed_with_backoff(
    provider: &dyn Provider,
    model: &str,
    inputs: Vec<String>,
    policy: BackoffPolicy,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let expected = inputs.len();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let request = EmbeddingRequest {
            model: model.to_string(),
            inputs: inputs.clone(),
        };

        let error = match provider.embed(request).await {
            Ok(response) if response.embeddings.len() == expected => return Ok(response.embeddings),
            Ok(response) => ProviderError::InvalidResponse(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            return Err(EmbeddingError { attempts: attempt, source: error });
        }

        let wait = match &error {
            ProviderError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs).min(policy.max)
            }
            _ => policy.delay(attempt - 1),
        };

        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            wait_ms = wait.as_millis() as u64,
            error = %error,
            "Embedding failed, backing off"
        );
        tokio::time::sleep(wait).await;
    }
}
