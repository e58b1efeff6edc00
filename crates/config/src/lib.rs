//! Configuration loading, validation, and management for Switchyard.
//!
//! Loads configuration from `~/.switchyard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.switchyard/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider ("openai", "openrouter", "ollama", "mock", ...)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default chat model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Embedding model used for the knowledge index and queries
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Upper bound on every model call, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Backup providers tried in order when the default one fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_providers: Vec<String>,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub math: MathConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub conversations: ConversationConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("embedding_model", &self.embedding_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fallback_providers", &self.fallback_providers)
            .field("providers", &self.providers)
            .field("router", &self.router)
            .field("security", &self.security)
            .field("math", &self.math)
            .field("knowledge", &self.knowledge)
            .field("conversations", &self.conversations)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

// ── Router ──────────────────────────────────────────────────────────────

/// Static routing heuristics: feature weights, vocabularies, and the
/// confidence threshold below which the default agent is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Minimum normalized score for a non-fallback decision
    #[serde(default = "default_router_threshold")]
    pub threshold: f64,

    /// Raw score that maps to full confidence
    #[serde(default = "default_saturation")]
    pub saturation: f64,

    #[serde(default)]
    pub math_weights: MathSignalWeights,

    #[serde(default)]
    pub knowledge_weights: KnowledgeSignalWeights,

    #[serde(default = "default_math_keywords")]
    pub math_keywords: Vec<String>,

    #[serde(default = "default_domain_terms")]
    pub domain_terms: Vec<String>,

    #[serde(default = "default_question_words")]
    pub question_words: Vec<String>,

    #[serde(default = "default_help_phrases")]
    pub help_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathSignalWeights {
    /// Numbers joined by an arithmetic operator
    pub expression: f64,
    pub keyword: f64,
    pub digits: f64,
    /// Multiplied by operators-per-character
    pub operator_density: f64,
}

impl Default for MathSignalWeights {
    fn default() -> Self {
        Self {
            expression: 0.7,
            keyword: 0.2,
            digits: 0.1,
            operator_density: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSignalWeights {
    pub domain_term: f64,
    pub question_word: f64,
    pub help_phrase: f64,
}

impl Default for KnowledgeSignalWeights {
    fn default() -> Self {
        Self {
            domain_term: 0.7,
            question_word: 0.3,
            help_phrase: 0.2,
        }
    }
}

fn default_router_threshold() -> f64 {
    0.5
}
fn default_saturation() -> f64 {
    1.0
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_math_keywords() -> Vec<String> {
    strings(&[
        "calculate", "compute", "solve", "evaluate", "what is", "how much is", "result of",
        "sum of", "product of", "plus", "minus", "times", "multiplied by", "divided by",
        "quanto é", "calcule",
    ])
}
fn default_domain_terms() -> Vec<String> {
    strings(&[
        "infinitepay", "card machine", "maquininha", "fee", "fees", "rate", "rates", "taxa",
        "taxas", "tarifa", "pix", "boleto", "payment", "payments", "pagamento", "card", "cards",
        "cartão", "debit", "credit", "installment", "installments", "parcelamento", "account",
        "conta", "transfer", "withdraw", "loan", "empréstimo", "tap to pay",
    ])
}
fn default_question_words() -> Vec<String> {
    strings(&[
        "what", "how", "why", "when", "where", "which", "who", "can i", "can you", "do you",
        "is there", "como", "qual", "quais", "onde", "quando", "por que",
    ])
}
fn default_help_phrases() -> Vec<String> {
    strings(&[
        "help", "explain", "tell me", "information about", "guide", "ajuda", "support",
    ])
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            threshold: default_router_threshold(),
            saturation: default_saturation(),
            math_weights: MathSignalWeights::default(),
            knowledge_weights: KnowledgeSignalWeights::default(),
            math_keywords: default_math_keywords(),
            domain_terms: default_domain_terms(),
            question_words: default_question_words(),
            help_phrases: default_help_phrases(),
        }
    }
}

// ── Security ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum raw message length in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_max_input_chars() -> usize {
    10_000
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
        }
    }
}

// ── Math ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathConfig {
    /// Decimal places results are rounded to
    #[serde(default = "default_precision")]
    pub precision: u32,

    #[serde(default = "default_max_expression_chars")]
    pub max_expression_chars: usize,

    #[serde(default = "default_math_temperature")]
    pub temperature: f32,
}

fn default_precision() -> u32 {
    6
}
fn default_max_expression_chars() -> usize {
    500
}
fn default_math_temperature() -> f32 {
    0.1
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            max_expression_chars: default_max_expression_chars(),
            temperature: default_math_temperature(),
        }
    }
}

// ── Knowledge ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Where the crawl starts
    #[serde(default = "default_root_url")]
    pub root_url: String,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Link hops from the root page
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Pages with less extracted text than this are skipped
    #[serde(default = "default_min_page_chars")]
    pub min_page_chars: usize,

    /// Chunk length in whitespace-separated tokens
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Retrieved chunks below this cosine similarity are dropped
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default = "default_knowledge_temperature")]
    pub temperature: f32,

    /// Persisted index location; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,

    /// Start a background ingestion job when the service boots
    #[serde(default = "default_true")]
    pub ingest_on_startup: bool,

    /// Re-crawl period in minutes (0 = never)
    #[serde(default)]
    pub refresh_interval_minutes: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_embed_max_attempts")]
    pub embed_max_attempts: u32,

    #[serde(default = "default_embed_initial_backoff_ms")]
    pub embed_initial_backoff_ms: u64,

    #[serde(default = "default_embed_max_backoff_ms")]
    pub embed_max_backoff_ms: u64,
}

fn default_root_url() -> String {
    "https://ajuda.infinitepay.io/pt-BR/".into()
}
fn default_max_pages() -> usize {
    50
}
fn default_max_depth() -> usize {
    3
}
fn default_min_page_chars() -> usize {
    50
}
fn default_chunk_tokens() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.25
}
fn default_knowledge_temperature() -> f32 {
    0.3
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    concat!("switchyard/", env!("CARGO_PKG_VERSION")).into()
}
fn default_embed_max_attempts() -> u32 {
    4
}
fn default_embed_initial_backoff_ms() -> u64 {
    200
}
fn default_embed_max_backoff_ms() -> u64 {
    5_000
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            min_page_chars: default_min_page_chars(),
            chunk_tokens: default_chunk_tokens(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            temperature: default_knowledge_temperature(),
            index_path: None,
            ingest_on_startup: true,
            refresh_interval_minutes: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            embed_max_attempts: default_embed_max_attempts(),
            embed_initial_backoff_ms: default_embed_initial_backoff_ms(),
            embed_max_backoff_ms: default_embed_max_backoff_ms(),
        }
    }
}

// ── Conversations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Idle time before a conversation expires
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Prior messages included in knowledge prompts
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}
fn default_history_window() -> usize {
    6
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            history_window: default_history_window(),
        }
    }
}

// ── Gateway ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Requests per client per minute
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Key the rate limiter on `X-Forwarded-For`. Enable only behind a
    /// reverse proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> u32 {
    30
}
fn default_allowed_origins() -> Vec<String> {
    strings(&["http://localhost:3000", "http://127.0.0.1:3000"])
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
            trust_forwarded_for: false,
        }
    }
}

// ── Logging ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_log_level")]
    pub level: String,

    /// Structured log entries retained in memory
    #[serde(default = "default_log_buffer")]
    pub buffer_size: usize,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_buffer() -> usize {
    1_000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: default_log_level(),
            buffer_size: default_log_buffer(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.switchyard/config.toml).
    ///
    /// Also checks environment variables:
    /// - `SWITCHYARD_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `SWITCHYARD_PROVIDER`, `SWITCHYARD_MODEL`
    /// - `SWITCHYARD_KNOWLEDGE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("SWITCHYARD_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .filter(|k| !k.trim().is_empty());
        }

        if let Ok(provider) = std::env::var("SWITCHYARD_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("SWITCHYARD_MODEL") {
            config.default_model = model;
        }

        if let Ok(url) = std::env::var("SWITCHYARD_KNOWLEDGE_URL") {
            config.knowledge.root_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".switchyard")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.router.threshold) {
            return Err(ConfigError::ValidationError(
                "router.threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.router.saturation <= 0.0 {
            return Err(ConfigError::ValidationError(
                "router.saturation must be > 0".into(),
            ));
        }

        if self.security.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "security.max_input_chars must be > 0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        let k = &self.knowledge;
        if k.chunk_tokens == 0 || k.chunk_overlap >= k.chunk_tokens {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than a non-zero knowledge.chunk_tokens".into(),
            ));
        }

        if k.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be > 0".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&k.min_similarity) {
            return Err(ConfigError::ValidationError(
                "knowledge.min_similarity must be between -1.0 and 1.0".into(),
            ));
        }

        if k.embed_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.embed_max_attempts must be >= 1".into(),
            ));
        }

        if self.math.precision > 12 {
            return Err(ConfigError::ValidationError(
                "math.precision must be at most 12".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Timeout applied to every model call.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            embedding_model: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
            fallback_providers: Vec::new(),
            providers: HashMap::new(),
            router: RouterConfig::default(),
            security: SecurityConfig::default(),
            math: MathConfig::default(),
            knowledge: KnowledgeConfig::default(),
            conversations: ConversationConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for switchyard_core::Error {
    fn from(err: ConfigError) -> Self {
        switchyard_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.security.max_input_chars, 10_000);
        assert_eq!(config.conversations.ttl_secs, 604_800);
        assert_eq!(config.knowledge.top_k, 5);
        assert!((config.router.threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.router.domain_terms, config.router.domain_terms);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.router.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.knowledge.chunk_overlap = config.knowledge.chunk_tokens;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_provider = "mock"

[router]
threshold = 0.6

[knowledge]
root_url = "https://help.example.com/"
max_pages = 5
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_provider, "mock");
        assert!((config.router.threshold - 0.6).abs() < f64::EPSILON);
        assert!(!config.router.math_keywords.is_empty());
        assert_eq!(config.knowledge.max_pages, 5);
        assert_eq!(config.knowledge.chunk_tokens, 500);
        assert_eq!(config.gateway.rate_limit_per_minute, 30);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "router = 12").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = AppConfig {
            api_key: Some("sk-very-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-other-secret".into()),
                ..ProviderConfig::default()
            },
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("sk-other-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("[knowledge]"));
        assert!(toml_str.contains("8000"));
    }

    #[test]
    fn config_error_converts_to_domain_error() {
        let err: switchyard_core::Error = ConfigError::ValidationError("bad".into()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
