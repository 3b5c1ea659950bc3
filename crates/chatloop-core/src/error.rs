//! Error taxonomy of the realtime core.

use crate::store::StoreError;
use chatloop_protocol::{MessageId, UserId};
use thiserror::Error;

/// Errors surfaced by core operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The message cannot be accepted as submitted.
    #[error("{0}")]
    Validation(String),

    /// No message with this ID exists.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// The identity has no bound handle.
    #[error("No active connection for {0}")]
    TransportUnavailable(UserId),

    /// The durable write or read failed.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// The caller may not perform this operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ChatError {
    /// Validation error for a payload with neither text nor image.
    #[must_use]
    pub fn empty_message() -> Self {
        ChatError::Validation("Message must contain text or image".to_string())
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation",
            ChatError::NotFound(_) => "not_found",
            ChatError::TransportUnavailable(_) => "transport_unavailable",
            ChatError::Persistence(_) => "persistence",
            ChatError::Unauthorized(_) => "unauthorized",
        }
    }

    /// Whether callers may safely ignore this error.
    ///
    /// Push failures and marks against unknown messages never change
    /// persisted state.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            ChatError::NotFound(_) | ChatError::TransportUnavailable(_)
        )
    }
}
