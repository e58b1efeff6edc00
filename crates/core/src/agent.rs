//! Agent domain types: routing decisions, handler responses, and the
//! `Handler` trait every specialized agent implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::ConversationContext;

/// The closed set of specialized agents.
///
/// Declaration order is the static routing priority: on equal scores the
/// earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Math,
    Knowledge,
}

impl AgentKind {
    /// All agents in priority order.
    pub const ALL: [AgentKind; 2] = [AgentKind::Math, AgentKind::Knowledge];

    /// Name reported in `agent_workflow` and `source_agent_response`.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Math => "MathAgent",
            AgentKind::Knowledge => "KnowledgeAgent",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Math => write!(f, "math"),
            AgentKind::Knowledge => write!(f, "knowledge"),
        }
    }
}

/// The Router's verdict for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub selected_agent: AgentKind,

    /// Always within `[0, 1]`.
    pub confidence: f64,

    pub reasoning: String,

    /// Every candidate with its normalized score, in priority order.
    pub alternatives: Vec<(AgentKind, f64)>,

    /// Set when no agent cleared the threshold and the default was applied.
    #[serde(default)]
    pub fallback: bool,

    /// Names of the features that fired, for logging.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
}

/// What a handler hands back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub source_agent: AgentKind,

    /// Wall-clock handler time in seconds.
    pub execution_time: f64,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl AgentResponse {
    pub fn new(source_agent: AgentKind, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_agent,
            execution_time: 0.0,
            metadata: serde_json::Map::new(),
            sources: None,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_execution_time(mut self, secs: f64) -> Self {
        self.execution_time = secs.max(0.0);
        self
    }

    /// True when the response explicitly states no sources were found.
    pub fn no_sources_found(&self) -> bool {
        self.metadata
            .get("no_sources_found")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A specialized agent that turns a sanitized message into a response.
#[async_trait]
pub trait Handler: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn handle(&self, message: &str, context: &ConversationContext) -> Result<AgentResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_math_first() {
        assert!(AgentKind::Math < AgentKind::Knowledge);
        assert_eq!(AgentKind::ALL[0], AgentKind::Math);
    }

    #[test]
    fn response_builder() {
        let resp = AgentResponse::new(AgentKind::Knowledge, "answer")
            .with_metadata("no_sources_found", true)
            .with_execution_time(-1.0);
        assert!(resp.no_sources_found());
        assert_eq!(resp.execution_time, 0.0);
        assert!(resp.sources.is_none());
    }

    #[test]
    fn decision_serializes_lowercase_agent() {
        let d = AgentDecision {
            selected_agent: AgentKind::Knowledge,
            confidence: 0.7,
            reasoning: "domain term".into(),
            alternatives: vec![(AgentKind::Math, 0.0), (AgentKind::Knowledge, 0.7)],
            fallback: false,
            signals: vec![],
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["selected_agent"], "knowledge");
        assert!(json.get("signals").is_none());
    }
}
