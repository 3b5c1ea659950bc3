//! Typing indicator with fixed-duration expiry.
//!
//! A single slot holds the current typer and the instant its indicator
//! expires. Any signal replaces the slot, so a renewal from the same sender
//! pushes the deadline out and a signal from another sender takes over. An
//! older sender's deadline therefore never clears a newer typer.

use chatloop_core::TYPING_EXPIRY;
use chatloop_protocol::UserId;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Typer {
    sender: UserId,
    deadline: Instant,
}

/// Tracks who is currently shown as typing.
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    expiry: Duration,
    current: Option<Typer>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(TYPING_EXPIRY)
    }
}

impl TypingIndicator {
    /// Create an indicator that expires `expiry` after the latest signal.
    #[must_use]
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            current: None,
        }
    }

    /// Configured expiry.
    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Record a typing signal from `sender` received at `now`.
    pub fn observe(&mut self, sender: UserId, now: Instant) {
        self.current = Some(Typer {
            sender,
            deadline: now + self.expiry,
        });
    }

    /// The typer shown at `now`, if any.
    #[must_use]
    pub fn current(&self, now: Instant) -> Option<&UserId> {
        self.current
            .as_ref()
            .filter(|typer| now < typer.deadline)
            .map(|typer| &typer.sender)
    }

    /// When the current indicator expires.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|typer| typer.deadline)
    }

    /// Clear the indicator if its deadline has passed. Returns the sender
    /// that was cleared.
    pub fn expire(&mut self, now: Instant) -> Option<UserId> {
        if self.current.as_ref().is_some_and(|typer| now >= typer.deadline) {
            self.current.take().map(|typer| typer.sender)
        } else {
            None
        }
    }

    /// Clear the indicator unconditionally.
    pub fn clear(&mut self) -> Option<UserId> {
        self.current.take().map(|typer| typer.sender)
    }

    /// Sleep until the current indicator's deadline.
    ///
    /// Never completes while nobody is typing, so it can sit in a
    /// `tokio::select!` next to the event stream.
    pub async fn expired(&self) {
        match self.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
