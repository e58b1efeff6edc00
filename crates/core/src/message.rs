//! Message and ConversationContext domain types.
//!
//! These are the value objects the orchestrator threads through a chat turn:
//! user sends a message → it is appended to the conversation → the dispatched
//! agent's reply is appended after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentKind;

/// Who authored a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The end user
    User,
    /// One of the specialized agents
    Agent,
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,

    /// Which agent produced this message (agent messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentKind>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            agent_type: None,
        }
    }

    /// Create a new agent message.
    pub fn agent(content: impl Into<String>, agent: AgentKind) -> Self {
        Self {
            content: content.into(),
            sender: Sender::Agent,
            timestamp: Utc::now(),
            agent_type: Some(agent),
        }
    }
}

/// A conversation between one user and the agents.
///
/// Created on the first message for a `conversation_id` and only ever
/// mutated by appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub message_history: Vec<Message>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            created_at: now,
            last_activity: now,
            message_history: Vec::new(),
        }
    }

    /// Append a message and bump `last_activity`.
    pub fn push(&mut self, message: Message) {
        self.last_activity = message.timestamp.max(self.last_activity);
        self.message_history.push(message);
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.message_history.len().saturating_sub(n);
        &self.message_history[start..]
    }

    pub fn len(&self) -> usize {
        self.message_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order_and_updates_activity() {
        let mut ctx = ConversationContext::new("conv-1", "user_1");
        let created = ctx.created_at;
        ctx.push(Message::user("what is 2+2"));
        ctx.push(Message::agent("4", AgentKind::Math));

        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.message_history[0].sender, Sender::User);
        assert_eq!(ctx.message_history[1].agent_type, Some(AgentKind::Math));
        assert!(ctx.last_activity >= created);
    }

    #[test]
    fn recent_returns_tail() {
        let mut ctx = ConversationContext::new("c", "u");
        for i in 0..5 {
            ctx.push(Message::user(format!("m{i}")));
        }
        let tail = ctx.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].content, "m3");
        assert_eq!(ctx.recent(50).len(), 5);
    }

    #[test]
    fn message_serialization() {
        let msg = Message::agent("82", AgentKind::Math);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "agent");
        assert_eq!(json["agent_type"], "math");

        let user = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(user.get("agent_type").is_none());
    }
}
