//! # ChatLoop Server
//!
//! HTTP and WebSocket front end of the ChatLoop realtime core.
//!
//! - `GET /api/messages/users` - conversation peers plus unseen counts
//! - `GET /api/messages/:peer_id` - conversation history
//! - `PUT /api/messages/send/:peer_id` - send a message
//! - `PUT /api/messages/mark/:message_id` - mark a message seen
//! - `GET /ws?token=...` - realtime events (`getOnlineUsers`, `newMessage`, `typing`)

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ws;

pub use app::{build_router, run_server, AppState};
pub use config::Config;
pub use error::ApiError;
