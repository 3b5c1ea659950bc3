//! # chatloop-protocol
//!
//! Wire definitions shared by the ChatLoop server and its clients.
//!
//! Everything that crosses a process boundary lives here:
//!
//! - **Identifiers** - `UserId` and `MessageId`
//! - **Messages** - the persisted `ChatMessage` record and the `MessagePayload` a sender submits
//! - **Events** - named JSON events on the realtime channel (`getOnlineUsers`, `newMessage`, `typing`)
//! - **API bodies** - request/response shapes of the REST surface
//! - **Codec** - JSON text frames and length-prefixed MessagePack binary frames
//!
//! ## Example
//!
//! ```rust
//! use chatloop_protocol::{codec, ServerEvent, UserId};
//!
//! let event = ServerEvent::OnlineUsers(vec![UserId::new("alice")]);
//! let text = codec::encode_json(&event).unwrap();
//! let decoded: ServerEvent = codec::decode_json(&text).unwrap();
//! assert_eq!(event, decoded);
//! ```

pub mod api;
pub mod codec;
pub mod events;
pub mod ids;
pub mod message;

pub use codec::{Encoding, ProtocolError};
pub use events::{ClientEvent, ServerEvent, TypingNotice, TypingSignal};
pub use ids::{MessageId, UserId};
pub use message::{now_millis, ChatMessage, MessagePayload};
