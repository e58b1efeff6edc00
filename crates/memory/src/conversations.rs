//! In-memory conversation store with TTL expiry.
//!
//! Each conversation carries a deadline that is pushed forward on every
//! append. Expired conversations are invisible to readers and pruned lazily
//! on the next write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::error::StoreError;
use switchyard_core::message::{ConversationContext, Message};
use switchyard_core::store::ConversationStore;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Stored {
    context: ConversationContext,
    expires_at: Instant,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// An in-memory store keyed by conversation id.
pub struct InMemoryConversationStore {
    ttl: Duration,
    conversations: Arc<RwLock<HashMap<String, Stored>>>,
}

impl InMemoryConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn prune(map: &mut HashMap<String, Stored>, now: Instant) {
        let before = map.len();
        map.retain(|_, s| s.is_live(now));
        let pruned = before - map.len();
        if pruned > 0 {
            debug!(pruned, "Expired conversations removed");
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(7 * 24 * 60 * 60))
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationContext>, StoreError> {
        let now = Instant::now();
        let map = self.conversations.read().await;
        Ok(map
            .get(conversation_id)
            .filter(|s| s.is_live(now))
            .map(|s| s.context.clone()))
    }

    async fn create(&self, context: ConversationContext) -> Result<ConversationContext, StoreError> {
        let now = Instant::now();
        let mut map = self.conversations.write().await;
        Self::prune(&mut map, now);

        let stored = map
            .entry(context.conversation_id.clone())
            .or_insert_with(|| Stored {
                context,
                expires_at: now + self.ttl,
            });
        Ok(stored.context.clone())
    }

    async fn append(&self, conversation_id: &str, message: Message) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut map = self.conversations.write().await;
        Self::prune(&mut map, now);

        let stored = map
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        stored.context.push(message);
        stored.expires_at = now + self.ttl;
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ConversationContext>, StoreError> {
        let now = Instant::now();
        let map = self.conversations.read().await;
        let mut contexts: Vec<ConversationContext> = map
            .values()
            .filter(|s| s.is_live(now) && s.context.user_id == user_id)
            .map(|s| s.context.clone())
            .collect();
        contexts.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.conversation_id.cmp(&b.conversation_id))
        });
        Ok(contexts)
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool, StoreError> {
        Ok(self.conversations.write().await.remove(conversation_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::agent::AgentKind;

    fn store() -> InMemoryConversationStore {
        InMemoryConversationStore::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn create_is_get_or_create() {
        let store = store();
        let first = store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();
        store.append("conv-1", Message::user("hi")).await.unwrap();

        let again = store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn append_keeps_order() {
        let store = store();
        store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();
        store.append("conv-1", Message::user("what is 2+2")).await.unwrap();
        store.append("conv-1", Message::agent("4", AgentKind::Math)).await.unwrap();

        let ctx = store.get("conv-1").await.unwrap().unwrap();
        assert_eq!(ctx.message_history[0].content, "what is 2+2");
        assert_eq!(ctx.message_history[1].content, "4");
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = store();
        let err = store.append("nope", Message::user("hi")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn conversations_expire_after_ttl() {
        let store = store();
        store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("conv-1").await.unwrap().is_none());
        assert!(store.append("conv-1", Message::user("late")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn append_refreshes_ttl() {
        let store = store();
        store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        store.append("conv-1", Message::user("still here")).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;

        assert!(store.get("conv-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_by_user_filters_and_orders() {
        let store = store();
        store.create(ConversationContext::new("a", "user_1")).await.unwrap();
        store.create(ConversationContext::new("b", "user_1")).await.unwrap();
        store.create(ConversationContext::new("c", "user_2")).await.unwrap();
        store.append("a", Message::user("newest")).await.unwrap();

        let listed = store.list_by_user("user_1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.conversation_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "a");
        assert!(store.list_by_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = store();
        store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();
        assert!(store.delete("conv-1").await.unwrap());
        assert!(!store.delete("conv-1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let store = Arc::new(store());
        store.create(ConversationContext::new("conv-1", "user_1")).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append("conv-1", Message::user(format!("m{i}"))).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.get("conv-1").await.unwrap().unwrap().len(), 20);
    }
}
