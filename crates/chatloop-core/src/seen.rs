//! Seen-state tracking.
//!
//! The persisted seen flag changes only through [`SeenTracker::mark_seen`]
//! and only from `false` to `true`. Nothing is pushed back to the sender.

use crate::error::ChatError;
use crate::store::{MessageStore, SeenOutcome};
use chatloop_protocol::{MessageId, UserId};
use std::sync::Arc;
use tracing::debug;

/// Advances messages' seen flags.
pub struct SeenTracker {
    store: Arc<dyn MessageStore>,
}

impl SeenTracker {
    /// Create a tracker.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Mark a message seen. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ID (safe to ignore) or
    /// `Persistence` if the store fails.
    pub async fn mark_seen(&self, id: MessageId) -> Result<SeenOutcome, ChatError> {
        match self.store.mark_seen(id).await? {
            SeenOutcome::NotFound => Err(ChatError::NotFound(id)),
            outcome => {
                debug!(id = %id, ?outcome, "Seen mark applied");
                Ok(outcome)
            }
        }
    }

    /// Mark a message seen on behalf of `viewer`, who must be its receiver.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if `viewer` did not receive the message, plus
    /// everything [`SeenTracker::mark_seen`] returns.
    pub async fn mark_seen_by(
        &self,
        viewer: &UserId,
        id: MessageId,
    ) -> Result<SeenOutcome, ChatError> {
        let message = self.store.get(id).await?.ok_or(ChatError::NotFound(id))?;

        if &message.receiver_id != viewer {
            return Err(ChatError::Unauthorized(format!(
                "{viewer} is not the receiver of message {id}"
            )));
        }
        if message.seen {
            return Ok(SeenOutcome::AlreadySeen);
        }

        self.mark_seen(id).await
    }
}
