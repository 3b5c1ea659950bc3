//! Request and response bodies of the REST surface.
//!
//! All responses carry a `success` flag so clients can branch on one field.

use crate::ids::UserId;
use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-peer unseen counts, keyed by sender.
pub type UnseenMap = BTreeMap<UserId, u32>;

/// A conversation peer as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub id: UserId,
    pub full_name: String,
}

/// `GET /api/messages/users`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeersResponse {
    pub success: bool,
    pub users: Vec<PeerSummary>,
    pub unseen_messages: UnseenMap,
}

/// `GET /api/messages/{peerId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub success: bool,
    pub messages: Vec<ChatMessage>,
}

/// `PUT /api/messages/send/{peerId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub new_message: ChatMessage,
}

/// `PUT /api/messages/mark/{messageId}` and other bare acknowledgments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    /// Successful acknowledgment.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}

impl ErrorBody {
    /// Create an error body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
