use serde::{Deserialize, Serialize};

/// Identity returned by a credential provider or token verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Unique user identifier
    pub id: String,
    /// Login name, may be empty for legacy accounts
    pub username: String,
    /// Email address (optional)
    pub email: Option<String>,
    /// Legacy display name, used when no username is set
    pub display_name: Option<String>,
}

impl AuthenticatedUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Label shown to other users in a room
    pub fn screen_name(&self) -> String {
        if !self.username.is_empty() {
            return self.username.clone();
        }
        self.display_name
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    }
}

/// One login submission
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Identifiers are compared case-insensitively everywhere
    pub fn normalized(&self) -> Self {
        Self {
            identifier: self.identifier.to_lowercase(),
            password: self.password.clone(),
        }
    }
}

// Keep passwords out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}
