//! The hub ties the registry, presence, delivery, seen and unseen tracking
//! and typing together behind one handle that transports share.

use crate::delivery::{Delivery, DeliveryPipeline, DEFAULT_MAX_TEXT_LENGTH};
use crate::error::ChatError;
use crate::presence::PresenceBroadcaster;
use crate::registry::{
    ConnectionRegistry, Handle, HandleId, PushReport, RegistryStats, Unbind,
    DEFAULT_HANDLE_CAPACITY,
};
use crate::seen::SeenTracker;
use crate::store::{MessageStore, SeenOutcome};
use crate::typing::TypingChannel;
use crate::unseen::UnseenAggregator;
use chatloop_protocol::api::UnseenMap;
use chatloop_protocol::{ChatMessage, MessageId, MessagePayload, ServerEvent, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Events each handle may buffer before pushes to it are dropped.
    pub handle_capacity: usize,
    /// Maximum message text length in characters.
    pub max_text_length: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            handle_capacity: DEFAULT_HANDLE_CAPACITY,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
        }
    }
}

/// A bound connection: its handle ID and the stream of events to write out.
#[derive(Debug)]
pub struct Session {
    pub identity: UserId,
    pub handle_id: HandleId,
    pub events: mpsc::Receiver<Arc<ServerEvent>>,
}

/// Central entry point for the realtime core.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    presence: PresenceBroadcaster,
    pipeline: DeliveryPipeline,
    seen: SeenTracker,
    unseen: UnseenAggregator,
    typing: TypingChannel,
    store: Arc<dyn MessageStore>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self::with_config(store, HubConfig::default())
    }

    /// Create a hub with custom configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn MessageStore>, config: HubConfig) -> Self {
        info!(store = store.name(), ?config, "Creating hub");

        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            presence: PresenceBroadcaster::new(Arc::clone(&registry)),
            pipeline: DeliveryPipeline::new(Arc::clone(&store), Arc::clone(&registry))
                .with_max_text_length(config.max_text_length),
            seen: SeenTracker::new(Arc::clone(&store)),
            unseen: UnseenAggregator::new(Arc::clone(&store)),
            typing: TypingChannel::new(Arc::clone(&registry)),
            registry,
            store,
            config,
        }
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind a new handle for an authenticated identity and publish the roster.
    pub fn connect(&self, identity: &UserId) -> Session {
        let (handle, events) = Handle::new(self.config.handle_capacity);
        let handle_id = handle.id().clone();

        let first = self.registry.bind(identity, handle);
        // Every bind publishes, so the new handle receives the roster too.
        self.presence.publish();

        debug!(identity = %identity, handle = %handle_id, first, "Session connected");

        Session {
            identity: identity.clone(),
            handle_id,
            events,
        }
    }

    /// Unbind a handle, publishing the roster if its identity went offline.
    pub fn disconnect(&self, handle_id: &HandleId) -> Unbind {
        let outcome = self.registry.unbind(handle_id);
        if outcome.roster_changed() {
            self.presence.publish();
        }
        outcome
    }

    /// Send a chat message.
    ///
    /// # Errors
    ///
    /// See [`DeliveryPipeline::send`].
    pub async fn send(
        &self,
        sender: &UserId,
        receiver: &UserId,
        payload: MessagePayload,
    ) -> Result<Delivery, ChatError> {
        self.pipeline.send(sender, receiver, payload).await
    }

    /// Mark a message seen.
    ///
    /// # Errors
    ///
    /// See [`SeenTracker::mark_seen`].
    pub async fn mark_seen(&self, id: MessageId) -> Result<SeenOutcome, ChatError> {
        self.seen.mark_seen(id).await
    }

    /// Mark a message seen on behalf of its receiver.
    ///
    /// # Errors
    ///
    /// See [`SeenTracker::mark_seen_by`].
    pub async fn mark_seen_by(
        &self,
        viewer: &UserId,
        id: MessageId,
    ) -> Result<SeenOutcome, ChatError> {
        self.seen.mark_seen_by(viewer, id).await
    }

    /// Conversation history between two identities, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store fails.
    pub async fn conversation(
        &self,
        viewer: &UserId,
        peer: &UserId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.store.conversation(viewer, peer).await?)
    }

    /// Unseen counts for `viewer`, grouped by sender.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store fails.
    pub async fn unseen_counts(&self, viewer: &UserId) -> Result<UnseenMap, ChatError> {
        self.unseen.compute_initial(viewer).await
    }

    /// Relay a typing signal.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` if the receiver is offline.
    pub fn typing(&self, sender: &UserId, receiver: &UserId) -> Result<PushReport, ChatError> {
        self.typing.emit(sender, receiver)
    }

    /// Check if an identity is online.
    #[must_use]
    pub fn is_online(&self, identity: &UserId) -> bool {
        self.registry.is_online(identity)
    }

    /// Current roster, sorted.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserId> {
        self.presence.roster()
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Name of the store backend.
    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}
