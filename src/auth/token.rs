use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::user::AuthenticatedUser;
use crate::error::{PresenceError, Result};

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;

/// Resolves bearer tokens used by socket-level authentication
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(None)` for unknown, invalid or expired tokens
    async fn find_by_token(&self, token: &str) -> Result<Option<AuthenticatedUser>>;
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Username
    pub username: String,
    /// Optional email
    pub email: Option<String>,
    /// Expiration time (as UTC timestamp)
    pub exp: u64,
    /// Issued at (as UTC timestamp)
    pub iat: u64,
}

impl Claims {
    /// Creates claims for a user, valid for `hours`
    pub fn for_user(user: &AuthenticatedUser, hours: u64) -> Self {
        let now = Utc::now().timestamp().max(0) as u64;
        Self {
            sub: user.id.clone(),
            username: user.screen_name(),
            email: user.email.clone(),
            exp: now + hours * 3600,
            iat: now,
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        (Utc::now().timestamp().max(0) as u64) > self.exp
    }
}

/// HS256 token issuer and verifier
pub struct JwtTokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_hours: u64,
}

impl JwtTokenVerifier {
    /// Creates a new verifier with a secret
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }

    pub fn with_ttl_hours(mut self, hours: u64) -> Self {
        self.ttl_hours = hours;
        self
    }

    /// Issues a token for an authenticated user
    pub fn issue_token(&self, user: &AuthenticatedUser) -> Result<String> {
        self.encode_claims(&Claims::for_user(user, self.ttl_hours))
    }

    /// Signs arbitrary claims
    pub fn encode_claims(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::default(), claims, &self.encoding_key)?)
    }

    /// Validates and decodes a token
    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| PresenceError::TokenError(format!("Invalid token: {}", e)))
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn find_by_token(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        let claims = match self.decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                log::debug!("Bearer token rejected: {}", e);
                return Ok(None);
            }
        };

        if claims.sub.is_empty() || claims.is_expired() {
            return Ok(None);
        }

        let mut user = AuthenticatedUser::new(claims.sub, claims.username);
        user.email = claims.email;
        Ok(Some(user))
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_find() {
        let verifier = JwtTokenVerifier::new("test-secret-key");
        let user = AuthenticatedUser::new("u1", "alice").with_email("alice@example.com");

        let token = verifier.issue_token(&user).unwrap();
        let found = verifier.find_by_token(&token).await.unwrap().unwrap();

        assert_eq!(found.id, "u1");
        assert_eq!(found.username, "alice");
        assert_eq!(found.email.as_deref(), Some("alice@example.com"));
    }

    #[tokio::test]
    async fn test_expired_and_garbage_tokens_are_unknown() {
        let verifier = JwtTokenVerifier::new("test-secret-key");
        let mut claims = Claims::for_user(&AuthenticatedUser::new("u1", "alice"), 1);
        claims.exp = claims.iat - 7200;
        let expired = verifier.encode_claims(&claims).unwrap();

        assert!(verifier.find_by_token(&expired).await.unwrap().is_none());
        assert!(verifier.find_by_token("invalid.token.here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_from_other_secret_is_unknown() {
        let issuer = JwtTokenVerifier::new("first-secret");
        let verifier = JwtTokenVerifier::new("second-secret");
        let token = issuer.issue_token(&AuthenticatedUser::new("u1", "alice")).unwrap();

        assert!(verifier.find_by_token(&token).await.unwrap().is_none());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123".to_string()));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
