// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";

// Login throttling defaults
pub const NO_DELAY_AUTH_ATTEMPTS: u32 = 3;
pub const BASE_LOCK_DELAY_MS: u64 = 5_000;
pub const MAX_LOCK_DURATION_MS: u64 = 24 * 60 * 60 * 1000;
// Unlocked failure records idle this long are forgotten
pub const STALE_ATTEMPT_TTL_SECS: u64 = 24 * 60 * 60;
pub const ACCOUNT_LOCKED_MESSAGE: &str = "Account is locked.";

// Provider enabled when PRESENCE_AUTH_PROVIDERS is unset
pub const DEFAULT_AUTH_PROVIDER: &str = "local";
