//! Provider selection: builds the language-model backend once at startup.
//!
//! The configured default provider becomes the primary; `fallback_providers`
//! are chained behind it. Without credentials the offline [`MockProvider`]
//! is used instead, so the whole pipeline still runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchyard_config::AppConfig;
use switchyard_core::provider::Provider;
use tracing::{info, warn};

use crate::fallback::FallbackProvider;
use crate::mock::MockProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Named provider registry.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// How the backend was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Real remote provider(s).
    Live,
    /// Offline mock, because `mock` was requested or credentials are missing.
    Mock,
}

/// The provider every handler shares.
#[derive(Clone)]
pub struct ProviderSelection {
    pub provider: Arc<dyn Provider>,
    pub mode: ProviderMode,
}

impl std::fmt::Debug for ProviderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSelection")
            .field("provider", &self.provider.name())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Providers that work without an API key.
fn is_keyless(name: &str) -> bool {
    matches!(name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Build one named provider, or `None` when it needs a key nobody supplied
/// or its HTTP client cannot be built.
fn build_named(config: &AppConfig, name: &str) -> Option<Arc<dyn Provider>> {
    if name == "mock" {
        return Some(Arc::new(MockProvider::new()));
    }

    let provider_config = config.providers.get(name);
    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone());

    let api_key = match api_key {
        Some(key) => key,
        None if is_keyless(name) => name.to_string(),
        None => return None,
    };

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    match OpenAiCompatProvider::with_timeout(name, base_url, api_key, config.request_timeout()) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!(provider = %name, error = %e, "Provider unavailable");
            None
        }
    }
}

/// Every provider named in the config, registered by name.
pub fn build_router(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let names = std::iter::once(&config.default_provider)
        .chain(config.fallback_providers.iter())
        .chain(config.providers.keys());

    for name in names {
        if router.get(name).is_some() {
            continue;
        }
        if let Some(provider) = build_named(config, name) {
            router.register(name.clone(), provider);
        }
    }

    router
}

/// Choose the shared provider from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderSelection {
    let router = build_router(config);

    let Some(primary) = router.default() else {
        warn!(
            provider = %config.default_provider,
            "No credentials for the configured provider; using offline mock"
        );
        return ProviderSelection {
            provider: Arc::new(MockProvider::new()),
            mode: ProviderMode::Mock,
        };
    };

    let mode = if primary.name() == "mock" {
        ProviderMode::Mock
    } else {
        ProviderMode::Live
    };

    let backups: Vec<Arc<dyn Provider>> = config
        .fallback_providers
        .iter()
        .filter(|name| **name != config.default_provider)
        .filter_map(|name| {
            let backup = router.get(name);
            if backup.is_none() {
                warn!(provider = %name, "Skipping fallback provider without credentials");
            }
            backup
        })
        .collect();

    if backups.is_empty() {
        info!(provider = %primary.name(), ?mode, "Provider selected");
        return ProviderSelection { provider: primary, mode };
    }

    let timeout = member_timeout(config.request_timeout(), backups.len() + 1);
    let chain = backups
        .into_iter()
        .fold(FallbackProvider::new("fallback").add(primary, timeout), |chain, p| chain.add(p, timeout));

    info!(providers = ?chain.provider_names(), ?mode, "Provider chain selected");
    ProviderSelection {
        provider: Arc::new(chain),
        mode,
    }
}

/// Each chain member's slice of the per-request budget, so a stalled
/// primary still leaves time for the backups.
fn member_timeout(request_timeout: Duration, members: usize) -> Duration {
    request_timeout / members.max(1) as u32
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn chain_members_split_the_request_budget() {
        assert_eq!(member_timeout(Duration::from_secs(30), 1), Duration::from_secs(30));
        assert_eq!(member_timeout(Duration::from_secs(30), 2), Duration::from_secs(15));
        assert_eq!(member_timeout(Duration::from_secs(30), 3), Duration::from_secs(10));
        assert_eq!(member_timeout(Duration::from_secs(30), 0), Duration::from_secs(30));
    }

    #[test]
    fn no_credentials_selects_mock() {
        let config = AppConfig::default();
        let selection = build_from_config(&config);
        assert_eq!(selection.mode, ProviderMode::Mock);
        assert_eq!(selection.provider.name(), "mock");
    }

    #[test]
    fn explicit_mock_provider() {
        let config = AppConfig {
            default_provider: "mock".into(),
            ..AppConfig::default()
        };
        assert_eq!(build_from_config(&config).mode, ProviderMode::Mock);
    }

    #[test]
    fn api_key_selects_live_provider() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let selection = build_from_config(&config);
        assert_eq!(selection.mode, ProviderMode::Live);
        assert_eq!(selection.provider.name(), "openai");
    }

    #[test]
    fn keyless_local_provider_is_live() {
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        let selection = build_from_config(&config);
        assert_eq!(selection.mode, ProviderMode::Live);
        assert_eq!(selection.provider.name(), "ollama");
    }

    #[test]
    fn fallback_chain_built_from_config() {
        let mut config = AppConfig {
            api_key: Some("sk-test".into()),
            fallback_providers: vec!["openrouter".into(), "groq".into()],
            ..AppConfig::default()
        };
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or".into()),
                ..ProviderConfig::default()
            },
        );

        let selection = build_from_config(&config);
        assert_eq!(selection.provider.name(), "fallback");

        let router = build_router(&config);
        assert_eq!(router.list(), vec!["groq", "openai", "openrouter"]);
    }

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("mock");
        router.register("mock", Arc::new(MockProvider::new()));
        assert!(router.get("mock").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }
}
