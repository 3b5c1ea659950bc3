//! Connection registry.
//!
//! Maps each identity to the set of transport handles it currently has bound.
//! An identity is online exactly while that set is non-empty, so a user with
//! two open sessions stays online until both are gone.
//!
//! Both maps are sharded (`DashMap`), so binds and unbinds of unrelated
//! identities never contend on a single lock.

use crate::error::ChatError;
use chatloop_protocol::{now_millis, ServerEvent, UserId};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Default number of events a handle may buffer before pushes are dropped.
pub const DEFAULT_HANDLE_CAPACITY: usize = 256;

static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of one transport handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(String);

impl HandleId {
    /// Create a handle ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique handle ID.
    #[must_use]
    pub fn generate() -> Self {
        let seq = HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{:x}", now_millis(), seq))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sending side of one bound connection.
///
/// The transport task owns the matching receiver and writes every event it
/// gets to the socket. Pushes never wait: a full or closed buffer drops the
/// event.
#[derive(Debug, Clone)]
pub struct Handle {
    id: HandleId,
    sender: mpsc::Sender<Arc<ServerEvent>>,
    connected_at: u64,
}

impl Handle {
    /// Create a handle with a buffer of `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<ServerEvent>>) {
        Self::with_id(HandleId::generate(), capacity)
    }

    /// Create a handle with a known ID.
    #[must_use]
    pub fn with_id(id: HandleId, capacity: usize) -> (Self, mpsc::Receiver<Arc<ServerEvent>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            sender,
            connected_at: now_millis(),
        };
        (handle, receiver)
    }

    /// Get the handle ID.
    #[must_use]
    pub fn id(&self) -> &HandleId {
        &self.id
    }

    /// When the handle was created, in Unix milliseconds.
    #[must_use]
    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    /// Queue an event without waiting.
    ///
    /// Returns `false` if the event was dropped.
    pub fn push(&self, event: Arc<ServerEvent>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(handle = %self.id, event = event.name(), "Handle buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(handle = %self.id, event = event.name(), "Handle closed, dropping event");
                false
            }
        }
    }
}

/// Result of removing a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unbind {
    /// The handle was not bound. Nothing changed.
    NotBound,
    /// The identity still has other handles; the roster is unchanged.
    Remaining { identity: UserId, handles: usize },
    /// That was the identity's last handle; it is now offline.
    WentOffline { identity: UserId },
}

impl Unbind {
    /// Whether this removal changed the set of online identities.
    #[must_use]
    pub fn roster_changed(&self) -> bool {
        matches!(self, Unbind::WentOffline { .. })
    }
}

/// Outcome of pushing one event to an identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Handles that accepted the event.
    pub delivered: usize,
    /// Handles whose buffer was full or closed.
    pub dropped: usize,
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Identities with at least one handle.
    pub online_identities: usize,
    /// Total bound handles.
    pub handles: usize,
}

/// The authoritative identity-to-handles map.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Identity -> bound handles.
    identities: DashMap<UserId, HashMap<HandleId, Handle>>,
    /// Handle -> owning identity.
    owners: DashMap<HandleId, UserId>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handle to an identity.
    ///
    /// Returns `true` if this is the identity's first handle. Binding a
    /// handle ID that is already bound moves it to `identity`.
    pub fn bind(&self, identity: &UserId, handle: Handle) -> bool {
        let handle_id = handle.id().clone();

        if let Some(previous) = self.owners.insert(handle_id.clone(), identity.clone()) {
            if &previous != identity {
                self.detach(&previous, &handle_id);
            }
        }

        let mut entry = self.identities.entry(identity.clone()).or_default();
        let first = entry.is_empty();
        entry.insert(handle_id.clone(), handle);

        debug!(
            identity = %identity,
            handle = %handle_id,
            handles = entry.len(),
            "Handle bound"
        );

        first
    }

    /// Remove a handle from whichever identity owns it.
    ///
    /// Unknown handles are a no-op.
    pub fn unbind(&self, handle_id: &HandleId) -> Unbind {
        let Some((_, identity)) = self.owners.remove(handle_id) else {
            trace!(handle = %handle_id, "Unbind of unknown handle");
            return Unbind::NotBound;
        };

        match self.detach(&identity, handle_id) {
            0 => {
                debug!(identity = %identity, handle = %handle_id, "Identity went offline");
                Unbind::WentOffline { identity }
            }
            handles => {
                debug!(identity = %identity, handle = %handle_id, handles, "Handle unbound");
                Unbind::Remaining { identity, handles }
            }
        }
    }

    /// Drop `handle_id` from `identity`'s set, deleting the entry once empty.
    ///
    /// Returns the number of handles left.
    fn detach(&self, identity: &UserId, handle_id: &HandleId) -> usize {
        let remaining = match self.identities.get_mut(identity) {
            Some(mut entry) => {
                entry.remove(handle_id);
                entry.len()
            }
            None => return 0,
        };

        if remaining == 0 {
            // A concurrent bind may have refilled the set since the guard dropped.
            self.identities.remove_if(identity, |_, handles| handles.is_empty());
        }

        remaining
    }

    /// Check if an identity has at least one handle.
    #[must_use]
    pub fn is_online(&self, identity: &UserId) -> bool {
        self.identities
            .get(identity)
            .is_some_and(|handles| !handles.is_empty())
    }

    /// All online identities.
    #[must_use]
    pub fn list_online(&self) -> BTreeSet<UserId> {
        self.identities
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Handle IDs bound to an identity.
    #[must_use]
    pub fn lookup(&self, identity: &UserId) -> BTreeSet<HandleId> {
        self.identities
            .get(identity)
            .map(|handles| handles.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Identity owning a handle.
    #[must_use]
    pub fn owner_of(&self, handle_id: &HandleId) -> Option<UserId> {
        self.owners.get(handle_id).map(|owner| owner.clone())
    }

    /// Push an event to every handle of one identity.
    ///
    /// # Errors
    ///
    /// Returns `TransportUnavailable` if the identity has no handle.
    pub fn push_to(
        &self,
        identity: &UserId,
        event: Arc<ServerEvent>,
    ) -> Result<PushReport, ChatError> {
        let handles = self
            .identities
            .get(identity)
            .filter(|handles| !handles.is_empty())
            .ok_or_else(|| ChatError::TransportUnavailable(identity.clone()))?;

        let mut report = PushReport::default();
        for handle in handles.values() {
            if handle.push(Arc::clone(&event)) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
            }
        }

        trace!(
            identity = %identity,
            event = event.name(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Pushed event"
        );

        Ok(report)
    }

    /// Push an event to every bound handle.
    pub fn broadcast(&self, event: Arc<ServerEvent>) -> PushReport {
        let mut report = PushReport::default();
        for entry in self.identities.iter() {
            for handle in entry.value().values() {
                if handle.push(Arc::clone(&event)) {
                    report.delivered += 1;
                } else {
                    report.dropped += 1;
                }
            }
        }
        report
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            online_identities: self.identities.len(),
            handles: self.owners.len(),
        }
    }
}
