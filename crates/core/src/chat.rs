//! Wire types of the chat contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inbound chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "conversationId")]
    pub conversation_id: String,
}

impl ChatRequest {
    pub fn new(
        message: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// One step of the agent workflow trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub agent: String,
    pub decision: String,
}

/// The reply to a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// e.g. `"MathAgent (confidence: 0.95)"`
    pub source_agent_response: String,
    pub agent_workflow: Vec<WorkflowStep>,
}

/// Structured error body returned for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build from a domain error using its stable code and public message.
    pub fn from_error(err: &crate::Error, request_id: impl Into<String>) -> Self {
        Self::new(err.code(), err.public_message(), request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_camel_case_aliases() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"message":"hi","userId":"client_1","conversationId":"conv-1"}"#,
        )
        .unwrap();
        assert_eq!(req.user_id, "client_1");
        assert_eq!(req.conversation_id, "conv-1");

        let snake: ChatRequest = serde_json::from_str(
            r#"{"message":"hi","user_id":"u","conversation_id":"c"}"#,
        )
        .unwrap();
        assert_eq!(snake.user_id, "u");
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorBody::new("EMPTY_INPUT", "Message is empty", "req-1");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "EMPTY_INPUT");
        assert_eq!(json["request_id"], "req-1");
        assert!(json["timestamp"].is_string());
    }
}
