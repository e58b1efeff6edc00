//! Primary/backup provider chain.
//!
//! Generation requests try each provider in order, each bounded by its own
//! timeout, and return the first success. Through `generate` the whole chain
//! also shares the caller's budget: a member gets at most what is left of it.
//! Embeddings always go to the primary: vectors from different models live
//! in different spaces and must never be mixed inside one index.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::error::ProviderError;
use switchyard_core::provider::*;
use tokio::time::Instant;
use tracing::{info, warn};

pub struct FallbackProvider {
    name: String,
    chain: Vec<FallbackEntry>,
}

struct FallbackEntry {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl FallbackProvider {
    /// Create a new fallback provider with no entries.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: Vec::new(),
        }
    }

    /// Add a provider to the chain with its own timeout.
    pub fn add(mut self, provider: Arc<dyn Provider>, timeout: Duration) -> Self {
        self.chain.push(FallbackEntry { provider, timeout });
        self
    }

    /// Add a provider with the default 30s timeout.
    pub fn add_default(self, provider: Arc<dyn Provider>) -> Self {
        self.add(provider, Duration::from_secs(30))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Names of the chained providers, primary first.
    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.provider.name()).collect()
    }

    /// Try each member in order. With a `deadline`, a member's timeout is
    /// cut to what remains before it, and an exhausted budget ends the chain.
    async fn run_chain(
        &self,
        request: ProviderRequest,
        deadline: Option<Instant>,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No providers in fallback chain".into());

        for (i, entry) in self.chain.iter().enumerate() {
            let provider_name = entry.provider.name().to_string();
            let budget = match deadline {
                Some(deadline) => entry.timeout.min(deadline.saturating_duration_since(Instant::now())),
                None => entry.timeout,
            };
            if budget.is_zero() {
                warn!(provider = %provider_name, "Fallback: request budget exhausted");
                return Err(ProviderError::Timeout(format!(
                    "'{}' ran out of time before trying '{}'",
                    self.name, provider_name
                )));
            }

            if i > 0 {
                info!(
                    provider = %provider_name,
                    attempt = i + 1,
                    total = self.chain.len(),
                    "Fallback: trying backup provider"
                );
            }

            match tokio::time::timeout(budget, entry.provider.complete(request.clone())).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => {
                    warn!(provider = %provider_name, error = %e, "Fallback: provider failed");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        provider = %provider_name,
                        timeout_secs = budget.as_secs_f64(),
                        "Fallback: provider timed out"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        provider_name,
                        budget.as_secs_f64()
                    ));
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.run_chain(request, None).await
    }

    async fn generate(
        &self,
        request: ProviderRequest,
        timeout: Duration,
    ) -> std::result::Result<String, ProviderError> {
        let deadline = Instant::now() + timeout;
        Ok(self.run_chain(request, Some(deadline)).await?.content)
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let primary = self
            .chain
            .first()
            .ok_or_else(|| ProviderError::NotConfigured("No providers in fallback chain".into()))?;

        match tokio::time::timeout(primary.timeout, primary.provider.embed(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "Embedding via '{}' timed out after {}s",
                primary.provider.name(),
                primary.timeout.as_secs_f64()
            ))),
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        for entry in &self.chain {
            if let Ok(true) = entry.provider.health_check().await {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails every call with a fixed error.
    struct BrokenProvider {
        name: &'static str,
        error: ProviderError,
        calls: Mutex<usize>,
    }

    impl BrokenProvider {
        fn new(name: &'static str, error: ProviderError) -> Self {
            Self { name, error, calls: Mutex::new(0) }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for BrokenProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            Err(self.error.clone())
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            Ok(false)
        }
    }

    /// Answers with its own name and embeds everything as `[dim; 1.0]`.
    struct EchoProvider {
        name: &'static str,
        dim: usize,
        calls: Mutex<usize>,
    }

    impl EchoProvider {
        fn new(name: &'static str, dim: usize) -> Self {
            Self { name, dim, calls: Mutex::new(0) }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            Ok(ProviderResponse {
                content: format!("from {}", self.name),
                usage: None,
                model: request.model,
            })
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|_| vec![1.0; self.dim]).collect(),
                model: request.model,
            })
        }
    }

    /// Never answers.
    struct StuckProvider;

    #[async_trait]
    impl Provider for StuckProvider {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            std::future::pending().await
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest::new("gpt-4o-mini", vec![PromptMessage::user("Expression: 70 + 12")])
    }

    #[tokio::test]
    async fn primary_answers_without_touching_backup() {
        let primary = Arc::new(EchoProvider::new("primary", 3));
        let backup = Arc::new(EchoProvider::new("backup", 3));
        let chain = FallbackProvider::new("chain")
            .add_default(primary.clone())
            .add_default(backup.clone());

        let response = chain.complete(request()).await.unwrap();
        assert_eq!(response.content, "from primary");
        assert_eq!(primary.calls(), 1);
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn service_error_falls_through_to_backup() {
        let primary = Arc::new(BrokenProvider::new(
            "primary",
            ProviderError::ApiError { status_code: 502, message: "bad gateway".into() },
        ));
        let backup = Arc::new(EchoProvider::new("backup", 3));
        let chain = FallbackProvider::new("chain")
            .add_default(primary.clone())
            .add_default(backup.clone());

        let response = chain.complete(request()).await.unwrap();
        assert_eq!(response.content, "from backup");
        assert_eq!(primary.calls(), 1);
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_falls_through_to_backup() {
        let backup = Arc::new(EchoProvider::new("backup", 3));
        let chain = FallbackProvider::new("chain")
            .add(Arc::new(StuckProvider), Duration::from_secs(5))
            .add_default(backup.clone());

        let response = chain.complete(request()).await.unwrap();
        assert_eq!(response.content, "from backup");
    }

    #[tokio::test(start_paused = true)]
    async fn generate_leaves_budget_for_the_backup() {
        let budget = Duration::from_secs(30);
        let backup = Arc::new(EchoProvider::new("backup", 3));
        let chain = FallbackProvider::new("chain")
            .add(Arc::new(StuckProvider), budget / 2)
            .add(backup.clone(), budget / 2);

        let answer = chain.generate(request(), budget).await.unwrap();
        assert_eq!(answer, "from backup");
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn generate_never_outlives_its_budget() {
        let backup = Arc::new(EchoProvider::new("backup", 3));
        let chain = FallbackProvider::new("chain")
            .add(Arc::new(StuckProvider), Duration::from_secs(600))
            .add_default(backup.clone());

        let started = Instant::now();
        let err = chain.generate(request(), Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(31));
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn last_timeout_is_reported() {
        let chain = FallbackProvider::new("chain").add(Arc::new(StuckProvider), Duration::from_secs(1));
        let err = chain.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn all_fail_returns_last_error() {
        let chain = FallbackProvider::new("chain")
            .add_default(Arc::new(BrokenProvider::new("a", ProviderError::Network("refused".into()))))
            .add_default(Arc::new(BrokenProvider::new(
                "b",
                ProviderError::AuthenticationFailed("bad key".into()),
            )));

        match chain.complete(request()).await.unwrap_err() {
            ProviderError::AuthenticationFailed(_) => {}
            other => panic!("Expected AuthenticationFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_not_configured() {
        let chain = FallbackProvider::new("empty");
        assert!(chain.is_empty());
        assert!(matches!(
            chain.complete(request()).await.unwrap_err(),
            ProviderError::NotConfigured(_)
        ));
        assert!(matches!(
            chain.embed_one("m", "x", Duration::from_secs(1)).await.unwrap_err(),
            ProviderError::NotConfigured(_)
        ));
    }

    #[tokio::test]
    async fn embeddings_only_use_primary() {
        let chain = FallbackProvider::new("chain")
            .add_default(Arc::new(EchoProvider::new("primary", 4)))
            .add_default(Arc::new(EchoProvider::new("backup", 8)));

        let vector = chain
            .embed_one("text-embedding-3-small", "pix fees", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(chain.provider_names(), vec!["primary", "backup"]);
    }

    #[tokio::test]
    async fn healthy_if_any_member_is() {
        let chain = FallbackProvider::new("chain")
            .add_default(Arc::new(BrokenProvider::new("down", ProviderError::Network("x".into()))))
            .add_default(Arc::new(EchoProvider::new("up", 1)));
        assert!(chain.health_check().await.unwrap());
    }
}
