//! Login throttling with exponential backoff lockouts
//!
//! Every failed login for an identifier increments its attempt counter. Once
//! the counter reaches `no_delay_attempts`, each further failure locks the
//! account for `base_delay * 2^(attempts - no_delay_attempts)`, capped at
//! `max_lock_duration`. A success removes the record entirely.
//!
//! State lives in process memory only; a restart clears all lockouts.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::constants::{BASE_LOCK_DELAY_MS, MAX_LOCK_DURATION_MS, NO_DELAY_AUTH_ATTEMPTS};

/// Source of the current time, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Throttle parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Failures tolerated before lockouts begin
    pub no_delay_attempts: u32,
    /// Length of the first lockout
    pub base_delay: Duration,
    /// Hard ceiling on any lockout
    pub max_lock_duration: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            no_delay_attempts: NO_DELAY_AUTH_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_LOCK_DELAY_MS),
            max_lock_duration: Duration::from_millis(MAX_LOCK_DURATION_MS),
        }
    }
}

impl ThrottleConfig {
    /// Lockout earned by the given attempt count, `None` below the threshold.
    /// A zero-length lock counts as no lock.
    pub fn lock_duration(&self, attempts: u32) -> Option<Duration> {
        if attempts < self.no_delay_attempts {
            return None;
        }

        let exponent = attempts - self.no_delay_attempts;
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_lock_duration.as_millis()).unwrap_or(u64::MAX);
        let lock = 1u64
            .checked_shl(exponent)
            .and_then(|factor| base.checked_mul(factor))
            .unwrap_or(u64::MAX)
            .min(max);

        if lock == 0 {
            return None;
        }
        Some(Duration::from_millis(lock))
    }
}

/// Failure record for one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_failure: DateTime<Utc>,
}

/// Result of recording a failed login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleOutcome {
    /// Plain failure, no lockout yet
    Failed { attempts: u32 },
    /// The failure locked the account
    Locked {
        attempts: u32,
        lock_duration: Duration,
        locked_until: DateTime<Utc>,
    },
}

/// Per-identifier failure counter with lockouts
pub struct LoginThrottle {
    config: ThrottleConfig,
    clock: Arc<dyn Clock>,
    /// Map of lowercase identifier to failure record
    attempts: Mutex<HashMap<String, LoginAttempt>>,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ThrottleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn key(identifier: &str) -> String {
        identifier.to_lowercase()
    }

    /// True iff the identifier has a lock that has not yet expired
    pub async fn check_locked(&self, identifier: &str) -> bool {
        self.locked_until(identifier).await.is_some()
    }

    /// End of the active lock, if any
    pub async fn locked_until(&self, identifier: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let attempts = self.attempts.lock().await;
        attempts
            .get(&Self::key(identifier))
            .and_then(|attempt| attempt.locked_until)
            .filter(|until| *until > now)
    }

    /// Count a failed login. The read-increment-write happens under one lock.
    pub async fn record_failure(&self, identifier: &str) -> ThrottleOutcome {
        let now = self.clock.now();
        let mut attempts = self.attempts.lock().await;
        let attempt = attempts
            .entry(Self::key(identifier))
            .or_insert(LoginAttempt {
                attempts: 0,
                locked_until: None,
                last_failure: now,
            });

        attempt.attempts = attempt.attempts.saturating_add(1);
        attempt.last_failure = now;

        match self.config.lock_duration(attempt.attempts) {
            Some(lock_duration) => {
                let delta = chrono::Duration::milliseconds(
                    i64::try_from(lock_duration.as_millis()).unwrap_or(i64::MAX),
                );
                let locked_until = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
                attempt.locked_until = Some(locked_until);
                ThrottleOutcome::Locked {
                    attempts: attempt.attempts,
                    lock_duration,
                    locked_until,
                }
            }
            None => ThrottleOutcome::Failed {
                attempts: attempt.attempts,
            },
        }
    }

    /// A successful login clears the identifier's record
    pub async fn record_success(&self, identifier: &str) {
        self.attempts.lock().await.remove(&Self::key(identifier));
    }

    /// Current failure record, if any
    pub async fn attempt(&self, identifier: &str) -> Option<LoginAttempt> {
        self.attempts.lock().await.get(&Self::key(identifier)).cloned()
    }

    pub async fn tracked_identifiers(&self) -> usize {
        self.attempts.lock().await.len()
    }

    /// Forget identifiers that are not locked and have not failed for `idle`.
    /// Returns the number of records removed.
    pub async fn purge_stale(&self, idle: Duration) -> usize {
        let now = self.clock.now();
        let idle = chrono::Duration::milliseconds(i64::try_from(idle.as_millis()).unwrap_or(i64::MAX));
        let mut attempts = self.attempts.lock().await;
        let before = attempts.len();
        attempts.retain(|_, attempt| {
            let locked = attempt.locked_until.is_some_and(|until| until > now);
            locked || now.signed_duration_since(attempt.last_failure) < idle
        });
        before - attempts.len()
    }

    /// Start periodic purge of stale failure records
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration, idle: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = self.purge_stale(idle).await;
                if purged > 0 {
                    log::debug!("Login throttle cleanup removed {} records", purged);
                }
            }
        });
    }
}
