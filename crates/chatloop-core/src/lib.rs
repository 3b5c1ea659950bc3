//! # chatloop-core
//!
//! Server side of the ChatLoop realtime core.
//!
//! - **Registry** - identity to transport-handle map; the only source of "who is online"
//! - **Presence** - full-roster snapshots on every roster change
//! - **Delivery** - validate, persist, then best-effort push of each message
//! - **Seen** - monotonic seen flags
//! - **Unseen** - per-sender unseen counts for a viewer
//! - **Typing** - unpersisted typing relay
//! - **Store** - persistence behind the `MessageStore` trait
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│     Hub     │────▶│    Store    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │
//!        │                   ▼
//!        │            ┌─────────────┐
//!        └────────────│  Registry   │
//!                     └─────────────┘
//! ```

pub mod delivery;
pub mod error;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod seen;
pub mod store;
pub mod typing;
pub mod unseen;

pub use delivery::{Delivery, DeliveryPipeline};
pub use error::ChatError;
pub use hub::{Hub, HubConfig, Session};
pub use presence::PresenceBroadcaster;
pub use registry::{ConnectionRegistry, Handle, HandleId, PushReport, RegistryStats, Unbind};
pub use seen::SeenTracker;
pub use store::{MemoryStore, MessageStore, NewMessage, SeenOutcome, StoreError};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use typing::{TypingChannel, TYPING_EXPIRY};
pub use unseen::{UnseenAggregator, UnseenCounter};
