//! Resolving transport sessions into presence connections

use warp::hyper::HeaderMap;

use crate::auth::token::{extract_bearer_token, TokenVerifier};
use crate::auth::user::AuthenticatedUser;
use crate::core::connection::{Connection, ConnectionKind};
use crate::error::{PresenceError, Result};
use crate::security_logger::{SecurityEvent, SecurityLogger};

/// The offered WebSocket subprotocol that carries a token, e.g. "token.{jwt}".
/// The upgrade response must echo it back or browsers abort the handshake.
pub fn token_subprotocol(headers: &HeaderMap) -> Option<String> {
    let protocols = headers.get("sec-websocket-protocol")?.to_str().ok()?;
    protocols
        .split(',')
        .map(str::trim)
        .find(|protocol| subprotocol_token(protocol).is_some())
        .map(str::to_string)
}

fn subprotocol_token(protocol: &str) -> Option<&str> {
    protocol
        .strip_prefix("bearer.")
        .or_else(|| protocol.strip_prefix("token."))
        .filter(|token| !token.is_empty())
}

/// Extract a bearer token from a WebSocket subprotocol header.
/// Format: "bearer.{token}" or "token.{token}"
pub fn extract_token_from_subprotocol(headers: &HeaderMap) -> Option<String> {
    token_subprotocol(headers).and_then(|protocol| subprotocol_token(&protocol).map(str::to_string))
}

/// Token lookup order: Authorization header, subprotocol, X-Auth-Token
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
    {
        log::debug!("Token extracted from Authorization header");
        return Some(token);
    }

    if let Some(token) = extract_token_from_subprotocol(headers) {
        log::debug!("Token extracted from WebSocket subprotocol");
        return Some(token);
    }

    headers
        .get("x-auth-token")
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Build a token-authenticated connection; unknown tokens are rejected
pub async fn connection_from_token(
    token: &str,
    verifier: &dyn TokenVerifier,
    security_logger: Option<&SecurityLogger>,
) -> Result<Connection> {
    match verifier.find_by_token(token).await? {
        Some(user) => Ok(Connection::new(ConnectionKind::Token, user.id.clone(), user.screen_name())),
        None => {
            if let Some(logger) = security_logger {
                logger
                    .log_event(SecurityEvent::TokenRejected {
                        reason: "unknown or expired token".to_string(),
                    })
                    .await;
            }
            Err(PresenceError::AuthenticationFailed)
        }
    }
}

/// Build a connection for a user resolved by the session middleware
pub fn connection_from_session(user: &AuthenticatedUser) -> Connection {
    Connection::new(ConnectionKind::Session, user.id.clone(), user.screen_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::JwtTokenVerifier;
    use warp::hyper::header::HeaderValue;

    #[test]
    fn test_extract_token_priority() {
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", HeaderValue::from_static("custom"));
        assert_eq!(extract_token(&headers), Some("custom".to_string()));

        headers.insert("sec-websocket-protocol", HeaderValue::from_static("chat, token.proto"));
        assert_eq!(extract_token(&headers), Some("proto".to_string()));

        headers.insert("authorization", HeaderValue::from_static("Bearer header"));
        assert_eq!(extract_token(&headers), Some("header".to_string()));
    }

    #[test]
    fn test_token_subprotocol_selection() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_subprotocol(&headers), None);

        headers.insert("sec-websocket-protocol", HeaderValue::from_static("chat, token., bearer.abc"));
        assert_eq!(token_subprotocol(&headers), Some("bearer.abc".to_string()));
        assert_eq!(extract_token_from_subprotocol(&headers), Some("abc".to_string()));
    }

    #[tokio::test]
    async fn test_token_connection_kind_and_rejection() {
        let verifier = JwtTokenVerifier::new("test-secret-key");
        let token = verifier.issue_token(&AuthenticatedUser::new("u1", "alice")).unwrap();

        let connection = connection_from_token(&token, &verifier, None).await.unwrap();
        assert_eq!(connection.kind(), ConnectionKind::Token);
        assert_eq!(connection.user_id(), "u1");
        assert_eq!(connection.screen_name(), "alice");

        let logger = SecurityLogger::new();
        let rejected = connection_from_token("bogus", &verifier, Some(&logger)).await;
        assert!(matches!(rejected, Err(PresenceError::AuthenticationFailed)));
        assert_eq!(logger.get_event_stats().await.get("token_rejected"), Some(&1));
    }

    #[test]
    fn test_session_connection() {
        let connection = connection_from_session(&AuthenticatedUser::new("u2", "bob"));
        assert_eq!(connection.kind(), ConnectionKind::Session);
        assert_eq!(connection.user_id(), "u2");
    }
}
