//! Typing signals.
//!
//! Typing notices are never stored, acknowledged or retried. The receiving
//! client expires them on its own after [`TYPING_EXPIRY`].

use crate::error::ChatError;
use crate::registry::{ConnectionRegistry, PushReport};
use chatloop_protocol::{ServerEvent, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// How long a receiver shows a typing indicator without a fresh signal.
pub const TYPING_EXPIRY: Duration = Duration::from_millis(2000);

/// Relays typing signals to receivers' handles.
pub struct TypingChannel {
    registry: Arc<ConnectionRegistry>,
}

impl TypingChannel {
    /// Create a typing channel.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Tell `receiver` that `sender` is typing.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` if the receiver is offline. Callers
    /// drop it.
    pub fn emit(&self, sender: &UserId, receiver: &UserId) -> Result<PushReport, ChatError> {
        let report = self
            .registry
            .push_to(receiver, Arc::new(ServerEvent::typing(sender.clone())))?;
        trace!(sender = %sender, receiver = %receiver, delivered = report.delivered, "Typing relayed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Handle;

    #[tokio::test]
    async fn test_emit_reaches_receiver_only() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (bob, mut rx_bob) = Handle::new(8);
        let (carol, mut rx_carol) = Handle::new(8);
        registry.bind(&UserId::new("bob"), bob);
        registry.bind(&UserId::new("carol"), carol);

        let typing = TypingChannel::new(Arc::clone(&registry));
        typing.emit(&UserId::new("alice"), &UserId::new("bob")).unwrap();

        assert_eq!(
            *rx_bob.recv().await.unwrap(),
            ServerEvent::typing(UserId::new("alice"))
        );
        assert!(rx_carol.try_recv().is_err());
    }

    #[test]
    fn test_emit_to_offline_receiver_is_dropped() {
        let typing = TypingChannel::new(Arc::new(ConnectionRegistry::new()));
        let err = typing
            .emit(&UserId::new("alice"), &UserId::new("bob"))
            .unwrap_err();
        assert!(err.is_benign());
    }
}
