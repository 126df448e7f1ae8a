use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum PresenceError {
    // Presence errors
    InvalidInput(String),
    StateInconsistency(String),
    RoomNotFound(String),

    // Auth errors
    AuthenticationFailed,
    ProviderError { provider: String, message: String },
    TokenError(String),

    // System errors
    SystemError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for PresenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::StateInconsistency(msg) => write!(f, "Presence state inconsistency: {}", msg),
            Self::RoomNotFound(id) => write!(f, "Room not found: {}", id),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::ProviderError { provider, message } => {
                write!(f, "Authentication provider '{}' failed: {}", provider, message)
            }
            Self::TokenError(msg) => write!(f, "Token error: {}", msg),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for PresenceError {}

impl From<jsonwebtoken::errors::Error> for PresenceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        PresenceError::TokenError(err.to_string())
    }
}

impl PresenceError {
    /// Shorthand used by providers to wrap their backend failures
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from an identity provider call
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError { .. })
    }
}

// Generic result type for the presence service
pub type Result<T> = std::result::Result<T, PresenceError>;
