//! Presence tracking: connections, rooms and the room registry

pub mod connection;
pub mod connection_collection;
pub mod events;
pub mod registry;
pub mod room;

// Re-export main components for convenience
pub use connection::{Connection, ConnectionKind};
pub use connection_collection::ConnectionCollection;
pub use events::{EventReceiver, PresenceChange, PresenceEvent};
pub use registry::{RoomRegistry, SharedRoom};
pub use room::{Room, UsernameChange};
