use std::collections::HashMap;
use std::sync::Arc;

use rusty_presence::core::{
    Connection, ConnectionKind, EventReceiver, PresenceEvent, Room, RoomRegistry, UsernameChange,
};

fn drain(rx: &mut EventReceiver) -> Vec<PresenceEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_two_tabs_produce_one_join_and_one_leave() {
    let registry = RoomRegistry::new();
    let mut rx = registry.subscribe().await;

    let tab1 = Connection::new(ConnectionKind::Session, "alice", "alice");
    let tab2 = Connection::new(ConnectionKind::Token, "alice", "alice");

    registry.add_connection("general", "general", tab1.clone()).await;
    registry.add_connection("general", "general", tab2.clone()).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_join());
    assert_eq!(events[0].room_id(), "general");
    assert_eq!(registry.user_count("general").await.unwrap(), 1);

    assert!(registry.remove_connection("general", &tab1).await);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(registry.user_count("general").await.unwrap(), 1);

    assert!(registry.remove_connection("general", &tab2).await);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(!events[0].is_join());
    assert_eq!(events[0].user_id(), "alice");
    assert_eq!(registry.user_count("general").await.unwrap(), 0);
}

#[tokio::test]
async fn test_rooms_track_presence_independently() {
    let registry = RoomRegistry::new();
    let mut rx = registry.subscribe().await;

    let in_general = Connection::new(ConnectionKind::Session, "bob", "bob");
    let in_random = Connection::new(ConnectionKind::Session, "bob", "bob");
    registry.add_connection("general", "general", in_general.clone()).await;
    registry.add_connection("random", "random", in_random).await;

    assert_eq!(drain(&mut rx).len(), 2);

    registry.remove_connection("general", &in_general).await;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].room_id(), "general");
    assert_eq!(registry.user_count("random").await.unwrap(), 1);
}

#[tokio::test]
async fn test_subscriber_attached_before_room_creation_sees_events() {
    let registry = RoomRegistry::new();
    let mut early = registry.subscribe().await;

    registry
        .add_connection("new-room", "new-room", Connection::new(ConnectionKind::Session, "u1", "U1"))
        .await;

    let mut late = registry.subscribe().await;
    registry
        .add_connection("new-room", "new-room", Connection::new(ConnectionKind::Session, "u2", "U2"))
        .await;

    assert_eq!(drain(&mut early).len(), 2);
    assert_eq!(drain(&mut late).len(), 1);
}

#[tokio::test]
async fn test_username_change_across_rooms() {
    let registry = RoomRegistry::new();
    registry
        .add_connection("a", "a", Connection::new(ConnectionKind::Session, "carol", "carol"))
        .await;
    registry
        .add_connection("b", "b", Connection::new(ConnectionKind::Session, "carol", "carol"))
        .await;
    registry.get_or_create("c", "c").await;
    let mut rx = registry.subscribe().await;

    let renamed = registry
        .username_changed(&UsernameChange {
            user_id: "carol".to_string(),
            old_username: "carol".to_string(),
            username: "caroline".to_string(),
        })
        .await;

    assert_eq!(renamed, 2);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.change().rename));
}

#[tokio::test]
async fn test_list_and_rename_rooms() {
    let registry = RoomRegistry::new();
    registry
        .add_connection("r1", "general", Connection::new(ConnectionKind::Session, "u1", "U1"))
        .await;
    registry.rename_room("r1", "lobby").await.unwrap();

    let rooms = registry.list_rooms().await;
    assert_eq!(rooms, vec![("r1".to_string(), "lobby".to_string(), 1)]);
}

/// Small deterministic generator so the sequence test needs no extra crates
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

#[test]
fn test_random_churn_matches_boundary_model() {
    let users = ["alice", "bob", "carol", "dave"];
    let mut room = Room::new("r1", "general");
    let mut rx = room.subscribe();
    let mut rng = Lcg(42);

    let mut live: Vec<Connection> = Vec::new();
    let mut per_user: HashMap<&str, usize> = HashMap::new();

    for _ in 0..2000 {
        let add = live.is_empty() || rng.next(2) == 0;
        if add {
            let user = users[rng.next(users.len())];
            let connection = Connection::new(ConnectionKind::Session, user, user);
            let before = per_user.get(user).copied().unwrap_or(0);

            room.add_connection(connection.clone());
            live.push(connection);
            *per_user.entry(user).or_default() += 1;

            let events = drain(&mut rx);
            if before == 0 {
                assert_eq!(events.len(), 1);
                assert!(events[0].is_join());
                assert_eq!(events[0].user_id(), user);
            } else {
                assert!(events.is_empty());
            }
        } else {
            let connection = live.swap_remove(rng.next(live.len()));
            let user = users
                .iter()
                .copied()
                .find(|u| *u == connection.user_id())
                .unwrap();

            assert!(room.remove_connection(&connection));
            let count = per_user.get_mut(user).unwrap();
            *count -= 1;

            let events = drain(&mut rx);
            if *count == 0 {
                assert_eq!(events.len(), 1);
                assert!(!events[0].is_join());
            } else {
                assert!(events.is_empty());
            }
        }

        let present = per_user.values().filter(|c| **c > 0).count();
        assert_eq!(room.get_user_count(), present);
        assert_eq!(room.get_user_ids().len(), present);
    }
}

#[tokio::test]
async fn test_concurrent_churn_keeps_join_leave_balanced() {
    let registry = Arc::new(RoomRegistry::new());
    let mut rx = registry.subscribe().await;

    let mut handles = vec![];
    for i in 0..64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("user{}", i % 5);
            let connection = Connection::new(ConnectionKind::Session, user.clone(), user);
            registry.add_connection("busy", "busy", connection.clone()).await;
            tokio::task::yield_now().await;
            assert!(registry.remove_connection("busy", &connection).await);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.user_count("busy").await.unwrap(), 0);

    // Per user, events must alternate join/leave starting with a join
    let mut last_was_join: HashMap<String, bool> = HashMap::new();
    for event in drain(&mut rx) {
        let previous = last_was_join.insert(event.user_id().to_string(), event.is_join());
        match previous {
            None => assert!(event.is_join()),
            Some(was_join) => assert_ne!(was_join, event.is_join()),
        }
    }
    assert!(last_was_join.values().all(|was_join| !was_join));
}
