//! Data model for structured log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mask::{mask_conversation_id, mask_user_id};

// ── Stage ─────────────────────────────────────────────────────────────────

/// The pipeline stage an entry belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Input sanitization and id validation.
    Security,
    /// Agent selection.
    Routing,
    /// A specialized agent producing its response.
    Handler,
    /// Conversation store reads and writes.
    Persistence,
    /// Final response assembly.
    Response,
    /// Corpus crawling, chunking and embedding.
    Ingestion,
    /// Vector search at query time.
    Retrieval,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Routing => write!(f, "routing"),
            Self::Handler => write!(f, "handler"),
            Self::Persistence => write!(f, "persistence"),
            Self::Response => write!(f, "response"),
            Self::Ingestion => write!(f, "ingestion"),
            Self::Retrieval => write!(f, "retrieval"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

// ── LogEntry ──────────────────────────────────────────────────────────────

/// One structured log record.
///
/// User and conversation identifiers are masked when they are attached,
/// so a raw identifier never reaches a sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub stage: Stage,
    /// Component that emitted the entry (e.g. "security_gate").
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: Level, stage: Stage, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            stage,
            component: component.into(),
            message: message.into(),
            request_id: None,
            conversation_id: None,
            user_id: None,
            duration_ms: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn info(stage: Stage, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Info, stage, component, message)
    }

    pub fn warn(stage: Stage, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Warn, stage, component, message)
    }

    pub fn error(stage: Stage, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Level::Error, stage, component, message)
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(mask_user_id(user_id));
        self
    }

    pub fn with_conversation(mut self, conversation_id: &str) -> Self {
        self.conversation_id = Some(mask_conversation_id(conversation_id));
        self
    }

    pub fn with_duration(mut self, elapsed: std::time::Duration) -> Self {
        self.duration_ms = Some(elapsed.as_secs_f64() * 1000.0);
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Fields rendered as a compact JSON object, for text sinks.
    pub fn fields_json(&self) -> String {
        serde_json::Value::Object(self.fields.clone()).to_string()
    }
}
