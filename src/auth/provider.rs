//! Pluggable credential verification
//!
//! A provider answers one question: do these credentials identify a user?
//! Providers are tried in configured order by the auth pipeline. Directory
//! backends (Kerberos, LDAP, ...) plug in by implementing [`CredentialProvider`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::user::{AuthenticatedUser, Credentials};
use crate::error::{PresenceError, Result};

/// Trait for credential verifiers
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Key used to enable the provider in configuration
    fn key(&self) -> &'static str;

    /// Verify credentials.
    ///
    /// `Ok(None)` means the provider does not accept them; `Err` means the
    /// provider itself could not answer (backend unreachable, corrupt data).
    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<AuthenticatedUser>>;
}

#[derive(Debug, Clone)]
struct LocalAccount {
    user: AuthenticatedUser,
    password_hash: String,
}

/// In-memory account directory with argon2 password hashes
#[derive(Default)]
pub struct LocalProvider {
    /// Map of lowercase username to account
    by_username: RwLock<HashMap<String, LocalAccount>>,
    /// Map of lowercase email to username key
    by_email: RwLock<HashMap<String, String>>,
}

impl LocalProvider {
    pub const KEY: &'static str = "local";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, hashing its password
    pub async fn add_user(&self, user: AuthenticatedUser, password: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        self.add_user_with_hash(user, password_hash).await
    }

    /// Register an account with an already hashed password
    pub async fn add_user_with_hash(&self, user: AuthenticatedUser, password_hash: String) -> Result<()> {
        if user.username.trim().is_empty() {
            return Err(PresenceError::InvalidInput(
                "local accounts require a username".to_string(),
            ));
        }

        let username = user.username.to_lowercase();
        let mut by_username = self.by_username.write().await;
        let mut by_email = self.by_email.write().await;

        if let Some(email) = &user.email {
            by_email.insert(email.to_lowercase(), username.clone());
        }
        by_username.insert(username, LocalAccount { user, password_hash });
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.by_username.read().await.len()
    }

    async fn find_account(&self, identifier: &str) -> Option<LocalAccount> {
        let identifier = identifier.to_lowercase();
        let by_username = self.by_username.read().await;

        // Identifiers containing '@' are emails, anything else is a username
        if identifier.contains('@') {
            let by_email = self.by_email.read().await;
            let username = by_email.get(&identifier)?;
            by_username.get(username).cloned()
        } else {
            by_username.get(&identifier).cloned()
        }
    }
}

#[async_trait]
impl CredentialProvider for LocalProvider {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<AuthenticatedUser>> {
        let Some(account) = self.find_account(&credentials.identifier).await else {
            log::debug!("Local provider: no account for {}", credentials.identifier);
            return Ok(None);
        };

        let matches = verify_password(&credentials.password, &account.password_hash)
            .map_err(|e| PresenceError::provider(Self::KEY, e.to_string()))?;

        if matches {
            Ok(Some(account.user))
        } else {
            log::debug!("Local provider: bad password for {}", credentials.identifier);
            Ok(None)
        }
    }
}

/// Providers available to the server, looked up by configuration key
#[derive(Default)]
pub struct ProviderCatalog {
    providers: HashMap<&'static str, Arc<dyn CredentialProvider>>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a provider available under its key
    pub fn register(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.providers.insert(provider.key(), provider);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.providers.contains_key(key)
    }

    /// Resolve the enabled keys into providers, keeping the configured order
    pub fn enabled(&self, keys: &[String]) -> Result<Vec<Arc<dyn CredentialProvider>>> {
        keys.iter()
            .map(|key| {
                self.providers.get(key.as_str()).cloned().ok_or_else(|| {
                    PresenceError::ConfigError(format!("Unknown authentication provider '{}'", key))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provider_with_alice() -> LocalProvider {
        let provider = LocalProvider::new();
        let alice = AuthenticatedUser::new("u1", "Alice").with_email("Alice@Example.com");
        provider.add_user(alice, "wonderland").await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_local_login_by_username_and_email() {
        let provider = provider_with_alice().await;

        let by_name = provider.authenticate(&Credentials::new("alice", "wonderland")).await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some("u1".to_string()));

        let by_email = provider
            .authenticate(&Credentials::new("alice@example.com", "wonderland"))
            .await
            .unwrap();
        assert!(by_email.is_some());
    }

    #[tokio::test]
    async fn test_local_rejects_unknown_user_and_bad_password() {
        let provider = provider_with_alice().await;

        assert!(provider.authenticate(&Credentials::new("bob", "wonderland")).await.unwrap().is_none());
        assert!(provider.authenticate(&Credentials::new("alice", "nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_provider_error() {
        let provider = LocalProvider::new();
        provider
            .add_user_with_hash(AuthenticatedUser::new("u2", "mallory"), "garbage".to_string())
            .await
            .unwrap();

        let err = provider.authenticate(&Credentials::new("mallory", "x")).await.unwrap_err();
        assert!(err.is_provider_error());
    }

    #[test]
    fn test_catalog_keeps_order_and_rejects_unknown() {
        let catalog = ProviderCatalog::new().register(Arc::new(LocalProvider::new()));

        let enabled = catalog.enabled(&["local".to_string()]).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].key(), "local");

        assert!(matches!(
            catalog.enabled(&["ldap".to_string()]),
            Err(PresenceError::ConfigError(_))
        ));
    }
}
