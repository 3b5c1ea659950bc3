//! Message delivery pipeline.
//!
//! `send` validates, persists, then pushes. Persistence is awaited and its
//! failure is returned to the caller. The push is best-effort: an offline
//! receiver or a full handle buffer is logged and absorbed, and the receiver
//! catches up through the unseen counts and history on its next load.

use crate::error::ChatError;
use crate::registry::{ConnectionRegistry, PushReport};
use crate::store::{MessageStore, NewMessage};
use chatloop_protocol::codec::MAX_FRAME_SIZE;
use chatloop_protocol::{ChatMessage, MessagePayload, ServerEvent, UserId};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default maximum text length, in characters.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10_000;

/// Headroom left in a pushed frame for the event envelope and escaping.
const PUSH_ENVELOPE_RESERVE: usize = 64 * 1024;

/// Largest text plus image size, in bytes, whose `newMessage` push still
/// fits in one frame.
pub const MAX_PAYLOAD_BYTES: usize = MAX_FRAME_SIZE - PUSH_ENVELOPE_RESERVE;

/// A persisted message plus what happened to its push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The authoritative persisted record.
    pub message: ChatMessage,
    /// Push result, or `None` if the receiver was offline.
    pub push: Option<PushReport>,
}

/// Validates, persists and fans out chat messages.
pub struct DeliveryPipeline {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
    max_text_length: usize,
    max_payload_bytes: usize,
}

impl DeliveryPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            store,
            registry,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }

    /// Set the maximum accepted text length.
    #[must_use]
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Set the maximum payload size in bytes. Capped at [`MAX_PAYLOAD_BYTES`].
    #[must_use]
    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max.min(MAX_PAYLOAD_BYTES);
        self
    }

    /// Check a payload without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the payload is empty, its text is too long, or
    /// it is too large to push.
    pub fn validate(&self, payload: MessagePayload) -> Result<MessagePayload, ChatError> {
        let payload = payload.normalized().ok_or_else(ChatError::empty_message)?;

        if payload.text_len() > self.max_text_length {
            return Err(ChatError::Validation(format!(
                "Message text exceeds {} characters",
                self.max_text_length
            )));
        }

        if payload.byte_len() > self.max_payload_bytes {
            return Err(ChatError::Validation(format!(
                "Message exceeds {} bytes",
                self.max_payload_bytes
            )));
        }

        Ok(payload)
    }

    /// Send a message from `sender` to `receiver`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` before anything is stored, or `Persistence` if the
    /// write fails. Push failures are never returned.
    pub async fn send(
        &self,
        sender: &UserId,
        receiver: &UserId,
        payload: MessagePayload,
    ) -> Result<Delivery, ChatError> {
        let payload = self.validate(payload)?;

        let message = self
            .store
            .insert(NewMessage {
                sender_id: sender.clone(),
                receiver_id: receiver.clone(),
                payload,
            })
            .await
            .map_err(|e| {
                error!(sender = %sender, receiver = %receiver, error = %e, "Failed to persist message");
                ChatError::Persistence(e)
            })?;

        debug!(id = %message.id, sender = %sender, receiver = %receiver, "Message persisted");

        let push = self.push(&message);
        Ok(Delivery { message, push })
    }

    /// Push a persisted message to the receiver's handles.
    fn push(&self, message: &ChatMessage) -> Option<PushReport> {
        let event = Arc::new(ServerEvent::NewMessage(message.clone()));

        match self.registry.push_to(&message.receiver_id, event) {
            Ok(report) => {
                if report.dropped > 0 {
                    warn!(
                        id = %message.id,
                        receiver = %message.receiver_id,
                        dropped = report.dropped,
                        "Message push dropped on some handles"
                    );
                }
                Some(report)
            }
            Err(e) => {
                debug!(id = %message.id, error = %e, "Receiver offline, push skipped");
                None
            }
        }
    }
}
