//! Multiset of connections indexed by owning user

use std::collections::{HashMap, HashSet};

use crate::core::connection::Connection;

/// Connections of a single room, with an incrementally maintained user index
#[derive(Debug, Default)]
pub struct ConnectionCollection {
    /// Map of connection ID to connection
    connections: HashMap<String, Connection>,
    /// Map of user ID to the IDs of that user's connections
    by_user: HashMap<String, HashSet<String>>,
}

impl ConnectionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection; adding an already known ID is a no-op
    pub fn add(&mut self, connection: Connection) {
        if self.connections.contains_key(connection.id()) {
            return;
        }

        self.by_user
            .entry(connection.user_id().to_string())
            .or_default()
            .insert(connection.id().to_string());
        self.connections.insert(connection.id().to_string(), connection);
    }

    /// Removes a connection by ID, returning whether it was present
    pub fn remove(&mut self, connection: &Connection) -> bool {
        let Some(removed) = self.connections.remove(connection.id()) else {
            return false;
        };

        // Index by the stored owner, not the caller's copy
        if let Some(ids) = self.by_user.get_mut(removed.user_id()) {
            ids.remove(removed.id());
            if ids.is_empty() {
                self.by_user.remove(removed.user_id());
            }
        }

        true
    }

    /// Distinct users holding at least one connection
    pub fn get_user_ids(&self) -> HashSet<String> {
        self.by_user.keys().cloned().collect()
    }

    /// Distinct screen names currently connected
    pub fn get_usernames(&self) -> HashSet<String> {
        self.connections
            .values()
            .map(|c| c.screen_name().to_string())
            .collect()
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.by_user.contains_key(user_id)
    }

    pub fn connection_count_for(&self, user_id: &str) -> usize {
        self.by_user.get(user_id).map_or(0, HashSet::len)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
