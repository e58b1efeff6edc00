//! Conversation store trait: persistence of `ConversationContext`s.
//!
//! Implementations must make `append` atomic per conversation id and expire
//! conversations after their TTL (refreshed on every append).

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ConversationContext, Message};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Fetch a live (non-expired) conversation.
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationContext>, StoreError>;

    /// Insert `context` unless a live conversation with that id exists.
    /// Returns whatever is stored afterwards.
    async fn create(&self, context: ConversationContext) -> Result<ConversationContext, StoreError>;

    /// Append one message to an existing conversation.
    async fn append(&self, conversation_id: &str, message: Message) -> Result<(), StoreError>;

    /// All live conversations for a user, most recently active first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConversationContext>, StoreError>;

    /// Remove a conversation. Returns whether it existed.
    async fn delete(&self, conversation_id: &str) -> Result<bool, StoreError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
