//! Login pipeline: lock check, ordered providers, throttle bookkeeping

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::provider::CredentialProvider;
use crate::auth::throttle::{LoginThrottle, ThrottleOutcome};
use crate::auth::user::{AuthenticatedUser, Credentials};
use crate::constants::ACCOUNT_LOCKED_MESSAGE;
use crate::error::{PresenceError, Result};
use crate::security_logger::{SecurityEvent, SecurityLogger};

/// Outcome of one login attempt that did not hit a provider error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated {
        user: AuthenticatedUser,
        provider: &'static str,
    },
    /// No provider accepted the credentials
    Failed,
    /// The account is locked; no provider was consulted or the failure caused the lock
    Locked {
        message: String,
        locked_until: DateTime<Utc>,
    },
}

/// Extra information handed back to the HTTP layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthInfo {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthOutcome {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    pub fn info(&self) -> AuthInfo {
        match self {
            Self::Locked { message, .. } => AuthInfo {
                locked: true,
                message: Some(message.clone()),
            },
            _ => AuthInfo::default(),
        }
    }
}

/// Runs the configured providers in order against a login attempt
pub struct AuthPipeline {
    providers: Vec<Arc<dyn CredentialProvider>>,
    throttle: Arc<LoginThrottle>,
    throttling_enabled: bool,
    security_logger: Option<Arc<SecurityLogger>>,
}

impl AuthPipeline {
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>, throttle: Arc<LoginThrottle>) -> Self {
        Self {
            providers,
            throttle,
            throttling_enabled: true,
            security_logger: None,
        }
    }

    /// When disabled, outcomes no longer update the throttle
    pub fn with_throttling(mut self, enabled: bool) -> Self {
        self.throttling_enabled = enabled;
        self
    }

    pub fn with_security_logger(mut self, logger: Arc<SecurityLogger>) -> Self {
        self.security_logger = Some(logger);
        self
    }

    pub fn throttle(&self) -> &Arc<LoginThrottle> {
        &self.throttle
    }

    /// Keys of the enabled providers, in the order they run
    pub fn provider_keys(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.key()).collect()
    }

    /// Authenticate one login submission.
    ///
    /// A provider error aborts the attempt and leaves the throttle untouched.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome> {
        let credentials = credentials.normalized();
        let identifier = credentials.identifier.as_str();

        if let Some(locked_until) = self.throttle.locked_until(identifier).await {
            self.log(SecurityEvent::LockedAttemptRejected {
                identifier: identifier.to_string(),
            })
            .await;
            return Ok(AuthOutcome::Locked {
                message: ACCOUNT_LOCKED_MESSAGE.to_string(),
                locked_until,
            });
        }

        for provider in &self.providers {
            match provider.authenticate(&credentials).await {
                Ok(Some(user)) if !user.id.is_empty() => {
                    if self.throttling_enabled {
                        self.throttle.record_success(identifier).await;
                    }
                    self.log(SecurityEvent::AuthenticationSuccess {
                        identifier: identifier.to_string(),
                        provider: provider.key().to_string(),
                    })
                    .await;
                    return Ok(AuthOutcome::Authenticated {
                        user,
                        provider: provider.key(),
                    });
                }
                Ok(_) => continue,
                Err(err) => {
                    let err = if err.is_provider_error() {
                        err
                    } else {
                        PresenceError::provider(provider.key(), err.to_string())
                    };
                    self.log(SecurityEvent::ProviderError {
                        identifier: identifier.to_string(),
                        provider: provider.key().to_string(),
                        error: err.to_string(),
                    })
                    .await;
                    return Err(err);
                }
            }
        }

        if !self.throttling_enabled {
            self.log(SecurityEvent::AuthenticationFailed {
                identifier: identifier.to_string(),
                attempts: None,
            })
            .await;
            return Ok(AuthOutcome::Failed);
        }

        match self.throttle.record_failure(identifier).await {
            ThrottleOutcome::Failed { attempts } => {
                self.log(SecurityEvent::AuthenticationFailed {
                    identifier: identifier.to_string(),
                    attempts: Some(attempts),
                })
                .await;
                Ok(AuthOutcome::Failed)
            }
            ThrottleOutcome::Locked {
                attempts,
                locked_until,
                ..
            } => {
                self.log(SecurityEvent::AccountLocked {
                    identifier: identifier.to_string(),
                    attempts,
                    locked_until,
                })
                .await;
                Ok(AuthOutcome::Locked {
                    message: ACCOUNT_LOCKED_MESSAGE.to_string(),
                    locked_until,
                })
            }
        }
    }

    async fn log(&self, event: SecurityEvent) {
        if let Some(logger) = &self.security_logger {
            logger.log_event(event).await;
        }
    }
}
