//! Server configuration module
//! Reads presence and authentication settings from the environment

use crate::auth::throttle::ThrottleConfig;
use crate::constants::{
    BASE_LOCK_DELAY_MS, DEFAULT_AUTH_PROVIDER, DEFAULT_HOST, DEFAULT_PORT, MAX_LOCK_DURATION_MS,
    NO_DELAY_AUTH_ATTEMPTS, STALE_ATTEMPT_TTL_SECS,
};
use crate::error::{PresenceError, Result};
use std::env;
use std::time::Duration;

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for socket bearer tokens
    pub jwt_secret: String,
    /// Enabled credential providers, in the order they are tried
    pub auth_providers: Vec<String>,
    /// Whether failed logins feed the lockout throttle
    pub login_throttling: bool,
    /// Failures tolerated before lockouts begin
    pub no_delay_attempts: u32,
    /// First lockout length in milliseconds
    pub base_lock_delay_ms: u64,
    /// Lockout ceiling in milliseconds
    pub max_lock_duration_ms: u64,
    /// Idle time after which an unlocked failure record is dropped
    pub throttle_record_ttl: Duration,
    /// How often empty rooms and stale failure records are pruned
    pub room_cleanup_interval: Duration,
    /// Accounts seeded into the local provider at startup, as (username, password)
    pub local_accounts: Vec<(String, String)>,
}

impl ServerConfig {
    /// Deterministic configuration for tests
    pub fn for_testing() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            jwt_secret: "test-jwt-key-only-for-unit-tests-9f8e7d6c5b4a".to_string(),
            auth_providers: vec![DEFAULT_AUTH_PROVIDER.to_string()],
            login_throttling: true,
            no_delay_attempts: NO_DELAY_AUTH_ATTEMPTS,
            base_lock_delay_ms: BASE_LOCK_DELAY_MS,
            max_lock_duration_ms: MAX_LOCK_DURATION_MS,
            throttle_record_ttl: Duration::from_secs(STALE_ATTEMPT_TTL_SECS),
            room_cleanup_interval: Duration::from_secs(60),
            local_accounts: Vec::new(),
        }
    }

    /// Throttle parameters derived from this configuration
    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            no_delay_attempts: self.no_delay_attempts,
            base_delay: Duration::from_millis(self.base_lock_delay_ms),
            max_lock_duration: Duration::from_millis(self.max_lock_duration_ms),
        }
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(PresenceError::ConfigError(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        let insecure_patterns = ["your-secret-key", "change-this", "secret", "password", "12345"];
        for pattern in &insecure_patterns {
            if secret.contains(pattern) {
                return Err(PresenceError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Generate one with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        Ok(())
    }

    fn validate_throttle(&self) -> Result<()> {
        if self.no_delay_attempts == 0 {
            return Err(PresenceError::ConfigError(
                "PRESENCE_NO_DELAY_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        // A zero-length lock would report a lockout that has already expired
        if self.base_lock_delay_ms == 0 || self.max_lock_duration_ms == 0 {
            return Err(PresenceError::ConfigError(
                "PRESENCE_BASE_LOCK_DELAY_MS and PRESENCE_MAX_LOCK_DURATION_MS must be greater than 0"
                    .to_string(),
            ));
        }
        if self.base_lock_delay_ms > self.max_lock_duration_ms {
            return Err(PresenceError::ConfigError(
                "PRESENCE_BASE_LOCK_DELAY_MS cannot exceed PRESENCE_MAX_LOCK_DURATION_MS".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_accounts(raw: &str) -> Result<Vec<(String, String)>> {
        raw.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((user, password)) if !user.is_empty() && !password.is_empty() => {
                    Ok((user.to_string(), password.to_string()))
                }
                _ => Err(PresenceError::ConfigError(format!(
                    "Invalid PRESENCE_LOCAL_ACCOUNTS entry '{}', expected user:password",
                    entry.split(':').next().unwrap_or_default()
                ))),
            })
            .collect()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("PRESENCE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup("PRESENCE_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = lookup("PRESENCE_JWT_SECRET")
            .or_else(|| lookup("JWT_SECRET"))
            .ok_or_else(|| {
                PresenceError::ConfigError(
                    "JWT_SECRET environment variable is required. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;

        let auth_providers: Vec<String> = lookup("PRESENCE_AUTH_PROVIDERS")
            .unwrap_or_else(|| DEFAULT_AUTH_PROVIDER.to_string())
            .split(',')
            .map(|key| key.trim().to_lowercase())
            .filter(|key| !key.is_empty())
            .collect();

        let login_throttling = lookup("PRESENCE_LOGIN_THROTTLING")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        let no_delay_attempts = lookup("PRESENCE_NO_DELAY_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(NO_DELAY_AUTH_ATTEMPTS);

        let base_lock_delay_ms = lookup("PRESENCE_BASE_LOCK_DELAY_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(BASE_LOCK_DELAY_MS);

        let max_lock_duration_ms = lookup("PRESENCE_MAX_LOCK_DURATION_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(MAX_LOCK_DURATION_MS);

        let throttle_ttl_secs = lookup("PRESENCE_THROTTLE_RECORD_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(STALE_ATTEMPT_TTL_SECS);

        let cleanup_secs = lookup("PRESENCE_ROOM_CLEANUP_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        // Format: "user:password;user2:password2"
        let local_accounts = lookup("PRESENCE_LOCAL_ACCOUNTS")
            .map(|raw| Self::parse_accounts(&raw))
            .transpose()?
            .unwrap_or_default();

        Self::validate_secret(&jwt_secret)?;

        let config = Self {
            host,
            port,
            jwt_secret,
            auth_providers,
            login_throttling,
            no_delay_attempts,
            base_lock_delay_ms,
            max_lock_duration_ms,
            throttle_record_ttl: Duration::from_secs(throttle_ttl_secs),
            room_cleanup_interval: Duration::from_secs(cleanup_secs),
            local_accounts,
        };
        config.validate_throttle()?;
        Ok(config)
    }
}
