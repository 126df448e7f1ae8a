//! Authentication: credential providers, login throttling and bearer tokens

pub mod password;
pub mod pipeline;
pub mod provider;
pub mod throttle;
pub mod token;
pub mod user;

// Re-export main components
pub use pipeline::{AuthInfo, AuthOutcome, AuthPipeline};
pub use provider::{CredentialProvider, LocalProvider, ProviderCatalog};
pub use throttle::{Clock, LoginThrottle, ManualClock, SystemClock, ThrottleConfig, ThrottleOutcome};
pub use token::{extract_bearer_token, Claims, JwtTokenVerifier, TokenVerifier};
pub use user::{AuthenticatedUser, Credentials};
