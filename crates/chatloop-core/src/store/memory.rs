//! In-memory message store.

use super::{MessageStore, NewMessage, SeenOutcome, StoreError};
use async_trait::async_trait;
use chatloop_protocol::api::UnseenMap;
use chatloop_protocol::{now_millis, ChatMessage, MessageId, UserId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    last_created_at: u64,
    /// Keyed by ID, so iteration is creation order.
    messages: BTreeMap<MessageId, ChatMessage>,
}

/// Message store kept entirely in process memory.
///
/// Contents are lost on restart. Useful for tests and single-node demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    /// Whether the store holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.messages.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut inner = self.inner.write().await;

        inner.next_id += 1;
        let id = MessageId(inner.next_id);
        let created_at = now_millis().max(inner.last_created_at);
        inner.last_created_at = created_at;

        let record = ChatMessage {
            id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.payload.text,
            image: message.payload.image,
            seen: false,
            created_at,
        };
        inner.messages.insert(id, record.clone());

        Ok(record)
    }

    async fn get(&self, id: MessageId) -> Result<Option<ChatMessage>, StoreError> {
        Ok(self.inner.read().await.messages.get(&id).cloned())
    }

    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect())
    }

    async fn mark_seen(&self, id: MessageId) -> Result<SeenOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(match inner.messages.get_mut(&id) {
            None => SeenOutcome::NotFound,
            Some(m) if m.seen => SeenOutcome::AlreadySeen,
            Some(m) => {
                m.seen = true;
                SeenOutcome::Marked
            }
        })
    }

    async fn unseen_counts(&self, viewer: &UserId) -> Result<UnseenMap, StoreError> {
        let inner = self.inner.read().await;
        let mut counts = UnseenMap::new();
        for m in inner
            .messages
            .values()
            .filter(|m| &m.receiver_id == viewer && !m.seen)
        {
            *counts.entry(m.sender_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
