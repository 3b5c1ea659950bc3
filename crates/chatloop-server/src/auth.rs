//! Identity lookup.
//!
//! Identities and their access tokens come from the `[[users]]` table of the
//! config. A request names its token in the `token` header, as a bearer
//! `Authorization` header, or as a `token` query parameter (WebSocket
//! clients cannot set headers).

use crate::app::AppState;
use crate::config::UserEntry;
use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chatloop_protocol::api::PeerSummary;
use chatloop_protocol::UserId;
use std::collections::HashMap;
use std::sync::Arc;

/// The known identities.
#[derive(Debug, Default)]
pub struct Directory {
    by_token: HashMap<String, UserId>,
    users: Vec<PeerSummary>,
}

impl Directory {
    /// Build a directory from configured users.
    #[must_use]
    pub fn new(entries: &[UserEntry]) -> Self {
        let mut directory = Self::default();
        for entry in entries {
            let id = UserId::new(entry.id.clone());
            directory.by_token.insert(entry.token.clone(), id.clone());
            directory.users.push(PeerSummary {
                id,
                full_name: entry.name.clone(),
            });
        }
        directory.users.sort_by(|a, b| a.id.cmp(&b.id));
        directory
    }

    /// Resolve an access token.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<&UserId> {
        self.by_token.get(token)
    }

    /// Whether `id` is a known identity.
    #[must_use]
    pub fn contains(&self, id: &UserId) -> bool {
        self.users.iter().any(|user| &user.id == id)
    }

    /// Everyone except `viewer`.
    #[must_use]
    pub fn peers_of(&self, viewer: &UserId) -> Vec<PeerSummary> {
        self.users
            .iter()
            .filter(|user| &user.id != viewer)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn token_from(parts: &Parts) -> Option<&str> {
    let headers = &parts.headers;
    if let Some(token) = headers.get("token").and_then(|v| v.to_str().ok()) {
        return Some(token);
    }
    if let Some(token) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token);
    }
    parts
        .uri
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from(parts).ok_or(ApiError::Unauthenticated)?;
        state
            .directory
            .authenticate(token)
            .cloned()
            .map(AuthUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn entries() -> Vec<UserEntry> {
        vec![
            UserEntry {
                id: "bob".into(),
                name: "Bob".into(),
                token: "t-bob".into(),
            },
            UserEntry {
                id: "alice".into(),
                name: "Alice".into(),
                token: "t-alice".into(),
            },
        ]
    }

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_directory_lookup() {
        let directory = Directory::new(&entries());

        assert_eq!(directory.authenticate("t-alice"), Some(&UserId::new("alice")));
        assert_eq!(directory.authenticate("nope"), None);
        assert!(directory.contains(&UserId::new("bob")));
        assert_eq!(directory.len(), 2);

        let peers = directory.peers_of(&UserId::new("alice"));
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].full_name, "Bob");
    }

    #[test]
    fn test_token_sources() {
        let p = parts(Request::builder().uri("/api").header("token", "a"));
        assert_eq!(token_from(&p), Some("a"));

        let p = parts(Request::builder().uri("/api").header("Authorization", "Bearer b"));
        assert_eq!(token_from(&p), Some("b"));

        let p = parts(Request::builder().uri("/ws?x=1&token=c"));
        assert_eq!(token_from(&p), Some("c"));

        let p = parts(Request::builder().uri("/ws"));
        assert_eq!(token_from(&p), None);
    }
}
