//! Chat message records.

use crate::ids::{MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// What a sender submits: text, an image reference, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image reference (URL or data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessagePayload {
    /// Payload carrying only text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    /// Payload carrying only an image.
    #[must_use]
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            text: None,
            image: Some(image.into()),
        }
    }

    /// Drop blank fields.
    ///
    /// Returns `None` when nothing deliverable remains.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let text = self.text.filter(|t| !t.trim().is_empty());
        let image = self.image.filter(|i| !i.trim().is_empty());

        if text.is_none() && image.is_none() {
            None
        } else {
            Some(Self { text, image })
        }
    }

    /// Length of the text part in characters.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }

    /// Combined size of text and image in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.text.as_ref().map_or(0, String::len) + self.image.as_ref().map_or(0, String::len)
    }
}

/// A persisted one-to-one chat message.
///
/// Everything except `seen` is immutable once stored, and `seen` only ever
/// moves from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub seen: bool,
    /// Server-assigned creation time in Unix milliseconds.
    pub created_at: u64,
}

impl ChatMessage {
    /// Whether this message belongs to the conversation between `a` and `b`.
    #[must_use]
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender_id == a && &self.receiver_id == b)
            || (&self.sender_id == b && &self.receiver_id == a)
    }

    /// The other participant, seen from `viewer`.
    #[must_use]
    pub fn peer_of(&self, viewer: &UserId) -> &UserId {
        if &self.sender_id == viewer {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChatMessage {
        ChatMessage {
            id: MessageId(7),
            sender_id: UserId::new("alice"),
            receiver_id: UserId::new("bob"),
            text: Some("hi".into()),
            image: None,
            seen: false,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_payload_normalization() {
        assert!(MessagePayload::default().normalized().is_none());
        assert!(MessagePayload::text("   ").normalized().is_none());

        let payload = MessagePayload {
            text: Some("  ".into()),
            image: Some("data:image/png;base64,AAAA".into()),
        }
        .normalized()
        .unwrap();
        assert!(payload.text.is_none());
        assert!(payload.image.is_some());

        // Non-blank text is kept verbatim
        let payload = MessagePayload::text(" hi ").normalized().unwrap();
        assert_eq!(payload.text.as_deref(), Some(" hi "));
    }

    #[test]
    fn test_message_wire_layout() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["senderId"], "alice");
        assert_eq!(value["receiverId"], "bob");
        assert_eq!(value["createdAt"], 1_700_000_000_000u64);
        assert_eq!(value["seen"], false);
        assert!(value.get("image").is_none());
    }

    #[test]
    fn test_conversation_membership() {
        let msg = sample();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let carol = UserId::new("carol");

        assert!(msg.is_between(&alice, &bob));
        assert!(msg.is_between(&bob, &alice));
        assert!(!msg.is_between(&alice, &carol));
        assert_eq!(msg.peer_of(&bob), &alice);
        assert_eq!(msg.peer_of(&alice), &bob);
    }
}
