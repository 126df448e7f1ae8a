use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::connection::Connection;
use crate::core::connection_collection::ConnectionCollection;
use crate::core::events::{EventReceiver, EventSender, EventDispatcher, PresenceChange, PresenceEvent};
use crate::error::PresenceError;

/// A user's display name changed while connected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameChange {
    pub user_id: String,
    pub old_username: String,
    pub username: String,
}

/// Represents a chat room and the users currently present in it
///
/// Raw connection churn is translated into join/leave events that fire only on
/// a user's first connection in and last connection out. All methods take
/// `&mut self`, so callers that share a room must serialize access (the
/// registry keeps each room behind its own mutex).
#[derive(Debug)]
pub struct Room {
    /// Opaque identifier, stable for the lifetime of the room
    room_id: String,
    /// Human readable alias, not used for presence
    room_slug: String,
    /// Live connections in this room
    connections: ConnectionCollection,
    /// Users seen at the last boundary check, mirrors the collection's user ids
    users: HashSet<String>,
    /// Presence event subscribers
    events: EventDispatcher,
}

impl Room {
    /// Creates an empty room
    pub fn new(room_id: impl Into<String>, room_slug: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            room_slug: room_slug.into(),
            connections: ConnectionCollection::new(),
            users: HashSet::new(),
            events: EventDispatcher::new(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn room_slug(&self) -> &str {
        &self.room_slug
    }

    /// Renames the room's alias; presence is unaffected
    pub fn set_slug(&mut self, room_slug: impl Into<String>) {
        self.room_slug = room_slug.into();
    }

    /// Subscribe to join/leave events of this room
    pub fn subscribe(&mut self) -> EventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn attach_subscriber(&mut self, sender: EventSender) {
        self.events.attach(sender);
    }

    /// Number of live event subscribers
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    pub fn get_user_ids(&self) -> HashSet<String> {
        self.connections.get_user_ids()
    }

    pub fn get_usernames(&self) -> HashSet<String> {
        self.connections.get_usernames()
    }

    /// True iff the user holds at least one live connection here
    pub fn contains_user(&self, user_id: &str) -> bool {
        self.connections.contains_user(user_id)
    }

    /// Number of distinct present users, not connections
    pub fn get_user_count(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Adds a connection, emitting `user_join` if it is the user's first one.
    /// Returns whether a join was emitted.
    pub fn add_connection(&mut self, connection: Connection) -> bool {
        if !connection.is_valid() {
            error!(
                "Attempt to add an invalid connection {} to room {} was detected",
                connection.id(),
                self.room_id
            );
            return false;
        }

        // Boundary is computed from the state before insertion
        let joined = !self.contains_user(connection.user_id());
        if joined {
            self.emit_user_join(connection.user_id(), connection.screen_name(), false);
        }
        self.connections.add(connection);

        self.verify_presence();
        joined
    }

    /// Removes a connection, emitting `user_leave` if it was the user's last one.
    /// Returns whether the connection was present.
    pub fn remove_connection(&mut self, connection: &Connection) -> bool {
        if !connection.is_valid() {
            error!(
                "Attempt to remove an invalid connection {} from room {} was detected",
                connection.id(),
                self.room_id
            );
            return false;
        }

        if !self.connections.remove(connection) {
            debug!(
                "Connection {} was not registered in room {}",
                connection.id(),
                self.room_id
            );
            return false;
        }

        if !self.contains_user(connection.user_id()) {
            self.emit_user_leave(connection.user_id(), connection.screen_name(), false);
        }

        self.verify_presence();
        true
    }

    /// Re-announces a present user under a new name as a leave/join pair.
    /// Both events carry `rename = true`; this is not a disconnect.
    pub fn username_changed(&mut self, change: &UsernameChange) -> bool {
        if !self.contains_user(&change.user_id) {
            return false;
        }

        self.emit_user_leave(&change.user_id, &change.old_username, true);
        self.emit_user_join(&change.user_id, &change.username, true);
        true
    }

    fn emit_user_join(&mut self, user_id: &str, username: &str, rename: bool) {
        self.users.insert(user_id.to_string());
        debug!("User {} joined room {}", user_id, self.room_id);
        let event = PresenceEvent::UserJoin(self.change_for(user_id, username, rename));
        self.events.emit(&event);
    }

    fn emit_user_leave(&mut self, user_id: &str, username: &str, rename: bool) {
        self.users.remove(user_id);
        debug!("User {} left room {}", user_id, self.room_id);
        let event = PresenceEvent::UserLeave(self.change_for(user_id, username, rename));
        self.events.emit(&event);
    }

    fn change_for(&self, user_id: &str, username: &str, rename: bool) -> PresenceChange {
        PresenceChange {
            room_id: self.room_id.clone(),
            room_slug: self.room_slug.clone(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            rename,
        }
    }

    /// The presence set must equal the collection's user ids. Debug builds
    /// panic on divergence; release builds keep going on the rebuilt set.
    fn verify_presence(&mut self) {
        if let Some(err) = self.reconcile_presence() {
            if cfg!(debug_assertions) {
                panic!("{}", err);
            }
        }
    }

    /// Rebuilds the presence set from the collection if the two diverged,
    /// returning the inconsistency that was repaired.
    fn reconcile_presence(&mut self) -> Option<PresenceError> {
        let actual = self.connections.get_user_ids();
        if actual == self.users {
            return None;
        }

        let err = PresenceError::StateInconsistency(format!(
            "room {} tracks {} present users but holds connections for {}",
            self.room_id,
            self.users.len(),
            actual.len()
        ));
        error!("{}", err);
        self.users = actual;
        Some(err)
    }
}
