//! Rusty Presence - room presence tracking and throttled login for chat servers
//!
//! Tracks which users hold live connections in each room, collapsing multiple
//! tabs/devices per user into single join/leave events, and authenticates
//! logins through an ordered provider pipeline guarded by exponential lockouts.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod security_logger;

// Re-export main components
pub use config::*;
pub use constants::*;
