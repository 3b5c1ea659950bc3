//! Durable message storage.
//!
//! The store owns ID and timestamp assignment so that, per store, IDs and
//! `created_at` never go backwards. An insert either commits a whole record
//! or leaves nothing behind.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chatloop_protocol::api::UnseenMap;
use chatloop_protocol::{ChatMessage, MessageId, MessagePayload, UserId};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// A validated message awaiting persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub payload: MessagePayload,
}

/// Result of a seen mark at the storage level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenOutcome {
    /// The flag moved from `false` to `true`.
    Marked,
    /// The flag was already `true`.
    AlreadySeen,
    /// No such message.
    NotFound,
}

/// Persistent message storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message with `seen = false`, assigning its ID and timestamp.
    async fn insert(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Fetch one message.
    async fn get(&self, id: MessageId) -> Result<Option<ChatMessage>, StoreError>;

    /// All messages between `a` and `b`, oldest first.
    async fn conversation(&self, a: &UserId, b: &UserId) -> Result<Vec<ChatMessage>, StoreError>;

    /// Set the seen flag. Never clears it.
    async fn mark_seen(&self, id: MessageId) -> Result<SeenOutcome, StoreError>;

    /// Count unseen messages addressed to `viewer`, grouped by sender.
    async fn unseen_counts(&self, viewer: &UserId) -> Result<UnseenMap, StoreError>;

    /// Backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &'static str;
}
