//! Client state synchronizer.
//!
//! [`ChatSession`] mirrors one viewer's view of the server: the open
//! conversation, local unseen counts, the online roster and the typing
//! indicator. It is a plain state machine. The caller feeds it pushed events
//! and REST responses and carries out the [`SyncAction`]s it returns.

use crate::typing::TypingIndicator;
use chatloop_core::UnseenCounter;
use chatloop_protocol::api::{PeerSummary, PeersResponse, UnseenMap};
use chatloop_protocol::{ChatMessage, ClientEvent, MessageId, ServerEvent, UserId};
use std::collections::BTreeSet;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// What applying a pushed event did to the local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// The roster was replaced.
    RosterUpdated,
    /// The message was appended to the open conversation and shown as
    /// seen. The caller must mark it seen on the server.
    MarkSeen(MessageId),
    /// The message belongs to a conversation that is not open.
    UnseenIncremented { peer: UserId, count: u32 },
    /// `sender` is now shown as typing.
    TypingShown(UserId),
    /// The event was not addressed to this viewer.
    Ignored,
}

/// One viewer's local chat state.
#[derive(Debug)]
pub struct ChatSession {
    viewer: UserId,
    peers: Vec<PeerSummary>,
    selected: Option<UserId>,
    messages: Vec<ChatMessage>,
    unseen: UnseenCounter,
    online: BTreeSet<UserId>,
    pending_seen: BTreeSet<MessageId>,
    typing: TypingIndicator,
}

impl ChatSession {
    /// Create an empty session for `viewer`.
    #[must_use]
    pub fn new(viewer: UserId) -> Self {
        Self::with_typing(viewer, TypingIndicator::default())
    }

    /// Create a session with a custom typing indicator.
    #[must_use]
    pub fn with_typing(viewer: UserId, typing: TypingIndicator) -> Self {
        Self {
            viewer,
            peers: Vec::new(),
            selected: None,
            messages: Vec::new(),
            unseen: UnseenCounter::new(),
            online: BTreeSet::new(),
            pending_seen: BTreeSet::new(),
            typing,
        }
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    /// Apply a sidebar load. Replaces the peer list and the unseen counts.
    pub fn load_peers(&mut self, response: PeersResponse) {
        debug!(
            viewer = %self.viewer,
            peers = response.users.len(),
            "Loaded conversation peers"
        );
        self.peers = response.users;
        self.load_unseen(response.unseen_messages);
    }

    /// Replace the unseen counts with a freshly computed aggregate.
    ///
    /// The open conversation stays at zero.
    pub fn load_unseen(&mut self, counts: UnseenMap) {
        self.unseen.load(counts);
        if let Some(peer) = &self.selected {
            self.unseen.reset(peer);
        }
    }

    pub fn peers(&self) -> &[PeerSummary] {
        &self.peers
    }

    /// Open the conversation with `peer` using freshly fetched history.
    ///
    /// Resets the peer's unseen count and shows its incoming messages as
    /// seen. Returns the IDs the caller must mark seen on the server.
    pub fn open_conversation(
        &mut self,
        peer: UserId,
        mut history: Vec<ChatMessage>,
    ) -> Vec<MessageId> {
        let mut to_mark = Vec::new();
        for message in &mut history {
            if !message.seen && message.receiver_id == self.viewer && message.sender_id == peer {
                message.seen = true;
                self.pending_seen.insert(message.id);
                to_mark.push(message.id);
            }
        }

        let cleared = self.unseen.reset(&peer);
        debug!(
            viewer = %self.viewer,
            peer = %peer,
            history = history.len(),
            cleared,
            "Opened conversation"
        );

        self.selected = Some(peer);
        self.messages = history;
        to_mark
    }

    /// Close the open conversation.
    pub fn close_conversation(&mut self) {
        self.selected = None;
        self.messages.clear();
    }

    /// The peer whose conversation is open.
    pub fn selected(&self) -> Option<&UserId> {
        self.selected.as_ref()
    }

    /// Messages of the open conversation, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Local unseen count for `peer`.
    pub fn unseen(&self, peer: &UserId) -> u32 {
        self.unseen.get(peer)
    }

    pub fn unseen_counts(&self) -> &UnseenMap {
        self.unseen.as_map()
    }

    /// Whether `peer` is in the last received roster.
    pub fn is_online(&self, peer: &UserId) -> bool {
        self.online.contains(peer)
    }

    pub fn online_users(&self) -> &BTreeSet<UserId> {
        &self.online
    }

    /// Apply a pushed event received at `now`.
    pub fn handle_event(&mut self, event: ServerEvent, now: Instant) -> SyncAction {
        match event {
            ServerEvent::OnlineUsers(users) => {
                trace!(viewer = %self.viewer, online = users.len(), "Roster replaced");
                self.online = users.into_iter().collect();
                SyncAction::RosterUpdated
            }
            ServerEvent::NewMessage(message) => self.handle_new_message(message),
            ServerEvent::Typing(notice) => {
                self.typing.observe(notice.sender_id.clone(), now);
                SyncAction::TypingShown(notice.sender_id)
            }
        }
    }

    fn handle_new_message(&mut self, mut message: ChatMessage) -> SyncAction {
        if message.receiver_id != self.viewer {
            warn!(
                viewer = %self.viewer,
                receiver = %message.receiver_id,
                id = %message.id,
                "Dropping message addressed to another identity"
            );
            return SyncAction::Ignored;
        }

        if self.selected.as_ref() == Some(&message.sender_id) {
            let id = message.id;
            message.seen = true;
            self.messages.push(message);
            self.pending_seen.insert(id);
            SyncAction::MarkSeen(id)
        } else {
            let peer = message.sender_id;
            let count = self.unseen.increment(&peer);
            SyncAction::UnseenIncremented { peer, count }
        }
    }

    /// Append a message this viewer just sent.
    ///
    /// Dropped if the user switched conversations before the send
    /// response arrived. Returns whether it was appended.
    pub fn record_sent(&mut self, message: ChatMessage) -> bool {
        if self.selected.as_ref() == Some(&message.receiver_id) {
            self.messages.push(message);
            true
        } else {
            debug!(
                viewer = %self.viewer,
                receiver = %message.receiver_id,
                "Sent message belongs to a closed conversation"
            );
            false
        }
    }

    /// Record that the server acknowledged a seen mark.
    ///
    /// A not-found answer counts as an acknowledgment too. Returns whether
    /// the mark was pending.
    pub fn confirm_seen(&mut self, id: MessageId) -> bool {
        self.pending_seen.remove(&id)
    }

    /// Seen marks shown locally but not yet acknowledged.
    pub fn pending_seen(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.pending_seen.iter().copied()
    }

    /// The typing event to send for a keystroke, if a receiver is selected.
    pub fn typing_signal(&self) -> Option<ClientEvent> {
        self.selected
            .as_ref()
            .map(|receiver| ClientEvent::typing(receiver.clone(), self.viewer.clone()))
    }

    /// Who is shown as typing at `now`.
    pub fn typing_user(&self, now: Instant) -> Option<&UserId> {
        self.typing.current(now)
    }

    /// Whether the open conversation's peer is typing at `now`.
    pub fn peer_is_typing(&self, now: Instant) -> bool {
        match (&self.selected, self.typing.current(now)) {
            (Some(peer), Some(typer)) => peer == typer,
            _ => false,
        }
    }

    /// Clear an expired typing indicator. Returns the cleared sender.
    pub fn expire_typing(&mut self, now: Instant) -> Option<UserId> {
        self.typing.expire(now)
    }

    pub fn typing(&self) -> &TypingIndicator {
        &self.typing
    }
}
