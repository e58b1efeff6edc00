//! Error types for the Switchyard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them and maps every variant to a stable, user-safe code before
//! anything crosses the system boundary.

use thiserror::Error;

/// The top-level error type for all Switchyard operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation (user visible) ---
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // --- Handler errors ---
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Knowledge pipeline ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Knowledge base is not ready yet")]
    KnowledgeNotReady,

    // --- Persistence ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(v) => v.code.as_str(),
            Error::Math(MathError::Parse(_)) => "MATH_PARSE_ERROR",
            Error::Math(MathError::Computation(_)) => "COMPUTATION_ERROR",
            Error::Provider(ProviderError::Timeout(_)) => "LLM_TIMEOUT",
            Error::Provider(_) => "LLM_SERVICE_ERROR",
            Error::Index(_) => "INDEX_UNAVAILABLE",
            Error::Embedding(_) => "LLM_SERVICE_ERROR",
            Error::KnowledgeNotReady => "KNOWLEDGE_NOT_READY",
            Error::Store(_) => "STORE_UNAVAILABLE",
            Error::Scrape(_)
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// A generic message that is safe to show to an end user.
    ///
    /// Validation reasons are user-facing by construction; everything else
    /// is replaced by a fixed sentence so internal details never leak.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(v) => v.reason.clone(),
            Error::Math(MathError::Parse(_)) => {
                "I couldn't find a valid arithmetic expression in your message.".into()
            }
            Error::Math(MathError::Computation(_)) => {
                "I couldn't compute that expression reliably. Please try rephrasing it.".into()
            }
            Error::Provider(ProviderError::Timeout(_)) => {
                "The request took too long to process. Please try again in a moment.".into()
            }
            Error::Provider(_) | Error::Embedding(_) => {
                "The language service is temporarily unavailable. Please try again later.".into()
            }
            Error::Index(_) => {
                "The knowledge base is temporarily unavailable. Please try again later.".into()
            }
            Error::KnowledgeNotReady => {
                "The knowledge base is still being prepared. Please try again shortly.".into()
            }
            Error::Store(_) => {
                "Conversation storage is temporarily unavailable. Please try again later.".into()
            }
            _ => "An unexpected error occurred. Please try again later.".into(),
        }
    }

    /// Whether this error is the caller's fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

// --- Bounded context errors ---

/// Stable codes for input validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    EmptyInput,
    InputTooLong,
    BlockedContent,
    InvalidUserId,
    InvalidConversationId,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::EmptyInput => "EMPTY_INPUT",
            ValidationCode::InputTooLong => "INPUT_TOO_LONG",
            ValidationCode::BlockedContent => "BLOCKED_CONTENT",
            ValidationCode::InvalidUserId => "INVALID_USER_ID",
            ValidationCode::InvalidConversationId => "INVALID_CONVERSATION_ID",
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised by the security gate and id validation.
#[derive(Debug, Clone, Error)]
#[error("{code}: {reason}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub reason: String,
    /// The blocked pattern family, when `code` is `BlockedContent`.
    pub family: Option<&'static str>,
}

impl ValidationError {
    pub fn new(code: ValidationCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            family: None,
        }
    }

    /// A conversation id that belongs to someone else.
    pub fn not_owner() -> Self {
        Self::new(
            ValidationCode::InvalidConversationId,
            "This conversation belongs to a different user.",
        )
    }

    pub fn blocked(family: &'static str) -> Self {
        Self {
            code: ValidationCode::BlockedContent,
            reason: "Your message contains content that is not allowed.".into(),
            family: Some(family),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MathError {
    #[error("No valid arithmetic expression: {0}")]
    Parse(String),

    #[error("Computation failed: {0}")]
    Computation(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Transient failures that are worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout(_)
                | ProviderError::Network(_)
        ) || matches!(self, ProviderError::ApiError { status_code, .. } if *status_code >= 500)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Error)]
#[error("Embedding failed after {attempts} attempt(s): {source}")]
pub struct EmbeddingError {
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    #[error("Index corrupt: {0}")]
    Corrupt(String),

    #[error("Index storage error: {0}")]
    Storage(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
