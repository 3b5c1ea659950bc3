//! Presence broadcasting.
//!
//! Every roster change sends the complete online set to every bound handle.
//! Clients replace their local roster on each snapshot, so a lost snapshot
//! is repaired by the next one.

use crate::registry::{ConnectionRegistry, PushReport};
use chatloop_protocol::{ServerEvent, UserId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Publishes roster snapshots taken from the registry.
#[derive(Debug)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    /// Serializes snapshot-and-send so handles never see an older roster after a newer one.
    publish_lock: Mutex<()>,
    /// Number of snapshots published.
    generation: AtomicU64,
}

impl PresenceBroadcaster {
    /// Create a broadcaster over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            publish_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Current roster, sorted.
    #[must_use]
    pub fn roster(&self) -> Vec<UserId> {
        self.registry.list_online().into_iter().collect()
    }

    /// Send the current roster to every bound handle.
    pub fn publish(&self) -> PushReport {
        let _guard = self
            .publish_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let roster = self.roster();
        let online = roster.len();
        let report = self
            .registry
            .broadcast(Arc::new(ServerEvent::OnlineUsers(roster)));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        debug!(
            generation,
            online,
            delivered = report.delivered,
            dropped = report.dropped,
            "Published roster"
        );

        report
    }

    /// Number of snapshots published so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}
