//! Named events on the realtime channel.
//!
//! Every event travels as `{"event": <name>, "data": <payload>}`.

use crate::ids::UserId;
use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// Event name for roster snapshots.
pub const ONLINE_USERS: &str = "getOnlineUsers";
/// Event name for message pushes.
pub const NEW_MESSAGE: &str = "newMessage";
/// Event name for typing signals.
pub const TYPING: &str = "typing";

/// Typing notice delivered to the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub sender_id: UserId,
}

/// Typing signal sent by the composing client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub receiver_id: UserId,
    /// Claimed sender. The server replaces it with the authenticated identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
}

/// Server to client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full roster of online identities.
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<UserId>),

    /// A message addressed to this identity was just persisted.
    #[serde(rename = "newMessage")]
    NewMessage(ChatMessage),

    /// A peer is composing a message.
    #[serde(rename = "typing")]
    Typing(TypingNotice),
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => ONLINE_USERS,
            ServerEvent::NewMessage(_) => NEW_MESSAGE,
            ServerEvent::Typing(_) => TYPING,
        }
    }

    /// Create a typing notice from `sender`.
    #[must_use]
    pub fn typing(sender: UserId) -> Self {
        ServerEvent::Typing(TypingNotice { sender_id: sender })
    }
}

/// Client to server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// The local user is composing a message to `receiver_id`.
    #[serde(rename = "typing")]
    Typing(TypingSignal),
}

impl ClientEvent {
    /// Create a typing signal.
    #[must_use]
    pub fn typing(receiver: UserId, sender: UserId) -> Self {
        ClientEvent::Typing(TypingSignal {
            receiver_id: receiver,
            sender_id: Some(sender),
        })
    }

    /// Event name as it appears on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Typing(_) => TYPING,
        }
    }
}
