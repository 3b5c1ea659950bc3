//! # chatloop-client
//!
//! Client-side mirror of the ChatLoop realtime core.
//!
//! [`ChatSession`] applies pushed [`ServerEvent`](chatloop_protocol::ServerEvent)s
//! and REST responses to one viewer's local state: the open conversation,
//! unseen counts, the online roster and who is typing. Network I/O stays
//! with the caller.
//!
//! ## Example
//!
//! ```rust
//! use chatloop_client::{ChatSession, SyncAction};
//! use chatloop_protocol::{ServerEvent, UserId};
//! use tokio::time::Instant;
//!
//! let mut session = ChatSession::new(UserId::new("me"));
//! let action = session.handle_event(
//!     ServerEvent::OnlineUsers(vec![UserId::new("alice")]),
//!     Instant::now(),
//! );
//! assert_eq!(action, SyncAction::RosterUpdated);
//! assert!(session.is_online(&UserId::new("alice")));
//! ```

pub mod sync;
pub mod typing;

pub use sync::{ChatSession, SyncAction};
pub use typing::TypingIndicator;
