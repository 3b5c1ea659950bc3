//! Unseen message counts.
//!
//! [`UnseenAggregator`] computes the authoritative per-sender counts from the
//! store once per session load. [`UnseenCounter`] is the live copy the viewer
//! keeps afterwards: +1 per push for a conversation that is not open, reset
//! to zero when it is opened. The two only reconcile at the next load.

use crate::error::ChatError;
use crate::store::MessageStore;
use chatloop_protocol::api::UnseenMap;
use chatloop_protocol::UserId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Live per-peer unseen counts for one viewer.
///
/// Peers with a zero count are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnseenCounter {
    counts: UnseenMap,
}

impl UnseenCounter {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all counts with a freshly computed aggregate.
    pub fn load(&mut self, counts: UnseenMap) {
        self.counts = counts.into_iter().filter(|(_, n)| *n > 0).collect();
    }

    /// Count for one peer.
    #[must_use]
    pub fn get(&self, peer: &UserId) -> u32 {
        self.counts.get(peer).copied().unwrap_or(0)
    }

    /// Add one unseen message from `peer`. Returns the new count.
    pub fn increment(&mut self, peer: &UserId) -> u32 {
        let count = self.counts.entry(peer.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Zero the count for `peer`. Returns the previous count.
    pub fn reset(&mut self, peer: &UserId) -> u32 {
        self.counts.remove(peer).unwrap_or(0)
    }

    /// Sum over all peers.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&n| u64::from(n)).sum()
    }

    /// Snapshot of the non-zero counts.
    #[must_use]
    pub fn as_map(&self) -> &UnseenMap {
        &self.counts
    }
}

impl From<UnseenMap> for UnseenCounter {
    fn from(counts: UnseenMap) -> Self {
        let mut counter = Self::new();
        counter.load(counts);
        counter
    }
}

/// Computes unseen counts from persisted state.
pub struct UnseenAggregator {
    store: Arc<dyn MessageStore>,
}

impl UnseenAggregator {
    /// Create an aggregator.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Unseen messages addressed to `viewer`, grouped by sender.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store query fails.
    pub async fn compute_initial(&self, viewer: &UserId) -> Result<UnseenMap, ChatError> {
        Ok(self.store.unseen_counts(viewer).await?)
    }
}
