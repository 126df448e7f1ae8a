//! Transport connection identity
//! A connection is one live socket, owned by exactly one user, in exactly one room

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How the transport authenticated the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Cookie-backed web session
    Session,
    /// Bearer token, bypasses the session middleware
    Token,
}

/// Immutable identity of a single live transport session
#[derive(Debug, Clone)]
pub struct Connection {
    id: String,
    kind: ConnectionKind,
    user_id: String,
    screen_name: String,
    connected_at: Instant,
}

impl Connection {
    /// Create a new connection with a unique ID
    pub fn new(kind: ConnectionKind, user_id: impl Into<String>, screen_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            user_id: user_id.into(),
            screen_name: screen_name.into(),
            connected_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    /// A connection without an owning user cannot take part in presence tracking
    pub fn is_valid(&self) -> bool {
        !self.user_id.trim().is_empty()
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Connection::new(ConnectionKind::Session, "alice", "alice");
        let b = Connection::new(ConnectionKind::Session, "alice", "alice");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_empty_user_is_invalid() {
        assert!(!Connection::new(ConnectionKind::Token, "", "ghost").is_valid());
        assert!(!Connection::new(ConnectionKind::Token, "   ", "ghost").is_valid());
        assert!(Connection::new(ConnectionKind::Token, "u1", "").is_valid());
    }
}
