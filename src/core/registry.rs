//! Registry of live rooms, created on first reference

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::core::connection::Connection;
use crate::core::events::{EventReceiver, EventSender};
use crate::core::room::{Room, UsernameChange};
use crate::error::{PresenceError, Result};

/// A room shared between transport sessions; the mutex is the per-room critical section
pub type SharedRoom = Arc<Mutex<Room>>;

#[derive(Default)]
struct RegistryInner {
    /// Map of room ID to room instance
    rooms: HashMap<String, SharedRoom>,
    /// Listeners attached to every room, present and future
    subscribers: Vec<EventSender>,
}

/// Maps room identifiers to rooms.
///
/// Mutations of one room are serialized by that room's mutex; different rooms
/// proceed in parallel. Creation happens under the registry write lock so two
/// first references to the same id always resolve to the same room.
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to presence events of all rooms
    pub async fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;
        for room in inner.rooms.values() {
            room.lock().await.attach_subscriber(tx.clone());
        }
        inner.subscribers.retain(|s| !s.is_closed());
        inner.subscribers.push(tx);
        rx
    }

    /// Returns the room for `room_id`, creating it atomically if needed.
    /// The slug only applies when the room is created.
    pub async fn get_or_create(&self, room_id: &str, room_slug: &str) -> SharedRoom {
        if let Some(room) = self.inner.read().await.rooms.get(room_id) {
            return room.clone();
        }

        let mut inner = self.inner.write().await;
        // Another caller may have created it between the two locks
        if let Some(room) = inner.rooms.get(room_id) {
            return room.clone();
        }

        let mut room = Room::new(room_id, room_slug);
        for subscriber in &inner.subscribers {
            room.attach_subscriber(subscriber.clone());
        }
        let room = Arc::new(Mutex::new(room));
        inner.rooms.insert(room_id.to_string(), room.clone());
        info!("Created room {} ({})", room_id, room_slug);
        room
    }

    pub async fn get(&self, room_id: &str) -> Option<SharedRoom> {
        self.inner.read().await.rooms.get(room_id).cloned()
    }

    /// Adds a connection to a room, creating the room on first reference.
    /// Returns whether the user joined.
    pub async fn add_connection(&self, room_id: &str, room_slug: &str, connection: Connection) -> bool {
        let room = self.get_or_create(room_id, room_slug).await;
        let mut room = room.lock().await;
        room.add_connection(connection)
    }

    /// Removes a connection from a room. Unknown rooms are treated like unknown connections.
    pub async fn remove_connection(&self, room_id: &str, connection: &Connection) -> bool {
        let Some(room) = self.get(room_id).await else {
            debug!("Ignoring removal of {} from unknown room {}", connection.id(), room_id);
            return false;
        };
        let mut room = room.lock().await;
        room.remove_connection(connection)
    }

    /// Announces a username change in every room the user is present in.
    /// Returns the number of rooms that emitted a rename.
    pub async fn username_changed(&self, change: &UsernameChange) -> usize {
        let rooms: Vec<SharedRoom> = self.inner.read().await.rooms.values().cloned().collect();
        let mut renamed = 0;
        for room in rooms {
            if room.lock().await.username_changed(change) {
                renamed += 1;
            }
        }
        renamed
    }

    /// Changes a room's slug
    pub async fn rename_room(&self, room_id: &str, room_slug: &str) -> Result<()> {
        let room = self
            .get(room_id)
            .await
            .ok_or_else(|| PresenceError::RoomNotFound(room_id.to_string()))?;
        room.lock().await.set_slug(room_slug);
        Ok(())
    }

    pub async fn user_count(&self, room_id: &str) -> Result<usize> {
        let room = self
            .get(room_id)
            .await
            .ok_or_else(|| PresenceError::RoomNotFound(room_id.to_string()))?;
        let count = room.lock().await.get_user_count();
        Ok(count)
    }

    /// Drops rooms without connections that nobody else holds a handle to.
    /// Returns the number of rooms removed.
    pub async fn prune_empty_rooms(&self) -> usize {
        let mut inner = self.inner.write().await;
        let mut empty = Vec::new();
        for (room_id, room) in &inner.rooms {
            // An outside handle could still add a connection after removal
            if Arc::strong_count(room) > 1 {
                continue;
            }
            if let Ok(guard) = room.try_lock() {
                if guard.is_empty() {
                    empty.push(room_id.clone());
                }
            }
        }

        for room_id in &empty {
            inner.rooms.remove(room_id);
            info!("Pruned empty room {}", room_id);
        }
        empty.len()
    }

    /// Lists all rooms as (room_id, slug, user count)
    pub async fn list_rooms(&self) -> Vec<(String, String, usize)> {
        let rooms: Vec<SharedRoom> = self.inner.read().await.rooms.values().cloned().collect();
        let mut listing = Vec::with_capacity(rooms.len());
        for room in rooms {
            let room = room.lock().await;
            listing.push((
                room.room_id().to_string(),
                room.room_slug().to_string(),
                room.get_user_count(),
            ));
        }
        listing
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Start cleanup task for empty rooms
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let pruned = self.prune_empty_rooms().await;
                if pruned > 0 {
                    debug!("Room cleanup removed {} rooms", pruned);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::ConnectionKind;

    #[tokio::test]
    async fn test_concurrent_first_reference_creates_one_room() {
        let registry = Arc::new(RoomRegistry::new());

        let mut handles = vec![];
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create("r1", "general").await
            }));
        }

        let mut rooms = vec![];
        for handle in handles {
            rooms.push(handle.await.unwrap());
        }

        assert_eq!(registry.room_count().await, 1);
        assert!(rooms.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_prune_keeps_rooms_with_connections_or_handles() {
        let registry = RoomRegistry::new();
        let alice = Connection::new(ConnectionKind::Session, "alice", "alice");

        registry.add_connection("busy", "busy", alice).await;
        registry.get_or_create("idle", "idle").await;
        let held = registry.get_or_create("held", "held").await;

        assert_eq!(registry.prune_empty_rooms().await, 1);
        assert!(registry.get("idle").await.is_none());
        assert!(registry.get("busy").await.is_some());
        assert!(registry.get("held").await.is_some());
        drop(held);
    }

    #[tokio::test]
    async fn test_rename_unknown_room_fails() {
        let registry = RoomRegistry::new();
        let result = registry.rename_room("nope", "x").await;
        assert!(matches!(result, Err(PresenceError::RoomNotFound(_))));
    }
}
