//! Presence events and the per-room dispatcher that fans them out to subscribers

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Payload shared by join and leave notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceChange {
    pub room_id: String,
    pub room_slug: String,
    pub user_id: String,
    pub username: String,
    /// Set on the synthetic leave/join pair produced by a username change
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rename: bool,
}

/// Events a room emits at the user presence boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    UserJoin(PresenceChange),
    UserLeave(PresenceChange),
}

impl PresenceEvent {
    pub fn change(&self) -> &PresenceChange {
        match self {
            Self::UserJoin(change) | Self::UserLeave(change) => change,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, Self::UserJoin(_))
    }

    pub fn user_id(&self) -> &str {
        &self.change().user_id
    }

    pub fn room_id(&self) -> &str {
        &self.change().room_id
    }
}

pub type EventSender = mpsc::UnboundedSender<PresenceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PresenceEvent>;

/// Delivers events to every live subscriber, dropping closed ones
#[derive(Debug, Default)]
pub struct EventDispatcher {
    subscribers: Vec<EventSender>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attach(tx);
        rx
    }

    /// Attach an existing sender (used by the registry for room-wide listeners).
    /// Subscribers whose receiver is gone are dropped first, so rooms that never
    /// emit do not accumulate dead senders.
    pub fn attach(&mut self, sender: EventSender) {
        self.subscribers.retain(|tx| !tx.is_closed());
        self.subscribers.push(sender);
    }

    /// Send an event to all subscribers, returns how many received it
    pub fn emit(&mut self, event: &PresenceEvent) -> usize {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(user: &str) -> PresenceEvent {
        PresenceEvent::UserJoin(PresenceChange {
            room_id: "r1".to_string(),
            room_slug: "general".to_string(),
            user_id: user.to_string(),
            username: user.to_string(),
            rename: false,
        })
    }

    #[test]
    fn test_closed_subscribers_are_pruned() {
        let mut dispatcher = EventDispatcher::new();
        let mut kept = dispatcher.subscribe();
        let dropped = dispatcher.subscribe();
        drop(dropped);

        assert_eq!(dispatcher.emit(&join("alice")), 1);
        assert_eq!(dispatcher.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap().user_id(), "alice");
    }

    #[test]
    fn test_subscribe_drops_closed_subscribers_without_emit() {
        let mut dispatcher = EventDispatcher::new();
        for _ in 0..100 {
            drop(dispatcher.subscribe());
        }
        let _live = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(join("alice")).unwrap();
        assert_eq!(json["type"], "user_join");
        assert_eq!(json["room_slug"], "general");
        assert!(json.get("rename").is_none());
    }
}
