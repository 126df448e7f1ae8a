//! Security-focused logging of authentication activity

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Types of security events to track
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityEvent {
    AuthenticationSuccess { identifier: String, provider: String },
    AuthenticationFailed { identifier: String, attempts: Option<u32> },
    AccountLocked { identifier: String, attempts: u32, locked_until: DateTime<Utc> },
    LockedAttemptRejected { identifier: String },
    ProviderError { identifier: String, provider: String, error: String },
    TokenRejected { reason: String },
}

impl SecurityEvent {
    /// Key used for counting and alert thresholds
    pub fn key(&self) -> &'static str {
        match self {
            SecurityEvent::AuthenticationSuccess { .. } => "auth_success",
            SecurityEvent::AuthenticationFailed { .. } => "auth_failed",
            SecurityEvent::AccountLocked { .. } => "account_locked",
            SecurityEvent::LockedAttemptRejected { .. } => "locked_attempt",
            SecurityEvent::ProviderError { .. } => "provider_error",
            SecurityEvent::TokenRejected { .. } => "token_rejected",
        }
    }

    /// Log level the event is reported at. Provider errors are outages, not user mistakes.
    pub fn level(&self) -> log::Level {
        match self {
            SecurityEvent::AuthenticationSuccess { .. } => log::Level::Info,
            SecurityEvent::ProviderError { .. } => log::Level::Error,
            _ => log::Level::Warn,
        }
    }
}

/// Security event with timestamp
#[derive(Debug, Clone)]
struct TimestampedEvent {
    event: SecurityEvent,
    timestamp: Instant,
}

/// Security logger for tracking and alerting on security events
pub struct SecurityLogger {
    events: RwLock<Vec<TimestampedEvent>>,
    event_counts: RwLock<HashMap<&'static str, usize>>,
    max_events: usize,
    alert_thresholds: HashMap<&'static str, usize>,
}

impl Default for SecurityLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityLogger {
    /// Create a new security logger
    pub fn new() -> Self {
        let mut alert_thresholds = HashMap::new();
        alert_thresholds.insert("auth_failed", 25);
        alert_thresholds.insert("account_locked", 5);
        alert_thresholds.insert("provider_error", 3);
        alert_thresholds.insert("token_rejected", 10);

        Self {
            events: RwLock::new(Vec::new()),
            event_counts: RwLock::new(HashMap::new()),
            max_events: 10000,
            alert_thresholds,
        }
    }

    /// Log a security event
    pub async fn log_event(&self, event: SecurityEvent) {
        let key = event.key();

        {
            let mut events = self.events.write().await;
            events.push(TimestampedEvent {
                event: event.clone(),
                timestamp: Instant::now(),
            });

            // Limit memory usage
            if events.len() > self.max_events {
                let events_to_remove = events.len() - self.max_events;
                events.drain(0..events_to_remove);
            }
        }

        // Counters are cumulative; alerts fire every time a threshold multiple is reached
        {
            let mut counts = self.event_counts.write().await;
            let count = counts.entry(key).or_insert(0);
            *count += 1;

            if let Some(&threshold) = self.alert_thresholds.get(key) {
                if *count % threshold == 0 {
                    log::error!("SECURITY ALERT: {} events of type '{}' recorded", count, key);
                    log::error!("Sample event: {:?}", event);
                }
            }
        }

        let level = event.level();
        match event {
            SecurityEvent::AuthenticationSuccess { identifier, provider } => {
                log::log!(level, "SECURITY: Authentication success - Identifier: {}, Provider: {}", identifier, provider);
            }
            SecurityEvent::AuthenticationFailed { identifier, attempts } => {
                log::log!(level, "SECURITY: Authentication failed - Identifier: {}, Attempts: {:?}", identifier, attempts);
            }
            SecurityEvent::AccountLocked { identifier, attempts, locked_until } => {
                log::log!(
                    level,
                    "SECURITY: Account locked - Identifier: {}, Attempts: {}, Until: {}",
                    identifier,
                    attempts,
                    locked_until
                );
            }
            SecurityEvent::LockedAttemptRejected { identifier } => {
                log::log!(level, "SECURITY: Login attempt on locked account - Identifier: {}", identifier);
            }
            SecurityEvent::ProviderError { identifier, provider, error } => {
                log::log!(
                    level,
                    "SECURITY: Authentication provider error - Identifier: {}, Provider: {}, Error: {}",
                    identifier,
                    provider,
                    error
                );
            }
            SecurityEvent::TokenRejected { reason } => {
                log::log!(level, "SECURITY: Bearer token rejected - Reason: {}", reason);
            }
        }
    }

    /// Get recent security events
    pub async fn get_recent_events(&self, duration: Duration) -> Vec<SecurityEvent> {
        let events = self.events.read().await;
        let now = Instant::now();

        events
            .iter()
            .filter(|event| now.duration_since(event.timestamp) <= duration)
            .map(|event| event.event.clone())
            .collect()
    }

    /// Get event statistics
    pub async fn get_event_stats(&self) -> HashMap<&'static str, usize> {
        self.event_counts.read().await.clone()
    }

    /// Clean up old events
    pub async fn cleanup_old_events(&self, max_age: Duration) {
        let mut events = self.events.write().await;
        let now = Instant::now();
        events.retain(|event| now.duration_since(event.timestamp) <= max_age);
    }

    /// Start periodic cleanup task
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                self.cleanup_old_events(Duration::from_secs(3600 * 24)).await; // Keep 24 hours
            }
        });
    }
}
