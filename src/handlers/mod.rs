//! Request handlers for the transport layer

pub mod auth;
pub mod login;
pub mod websocket;

// Re-export the handlers
pub use auth::{connection_from_session, connection_from_token, extract_token};
pub use login::handle_login;
pub use websocket::{handle_presence_socket, upgrade_presence_socket};
