//! JSON login endpoint over the auth pipeline

use serde::Serialize;
use std::sync::Arc;
use warp::http::StatusCode;

use crate::auth::pipeline::{AuthInfo, AuthOutcome, AuthPipeline};
use crate::auth::token::JwtTokenVerifier;
use crate::auth::user::{AuthenticatedUser, Credentials};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub identity: Option<AuthenticatedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub info: AuthInfo,
}

/// Map a login attempt to a status code and response body
pub async fn login(
    credentials: &Credentials,
    pipeline: &AuthPipeline,
    tokens: &JwtTokenVerifier,
) -> (StatusCode, LoginResponse) {
    let outcome = match pipeline.authenticate(credentials).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                LoginResponse {
                    error: Some(e.to_string()),
                    identity: None,
                    token: None,
                    info: AuthInfo::default(),
                },
            )
        }
    };

    let info = outcome.info();
    match outcome {
        AuthOutcome::Authenticated { user, .. } => match tokens.issue_token(&user) {
            Ok(token) => (
                StatusCode::OK,
                LoginResponse {
                    error: None,
                    identity: Some(user),
                    token: Some(token),
                    info,
                },
            ),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                LoginResponse {
                    error: Some(e.to_string()),
                    identity: None,
                    token: None,
                    info,
                },
            ),
        },
        AuthOutcome::Failed => (
            StatusCode::UNAUTHORIZED,
            LoginResponse {
                error: None,
                identity: None,
                token: None,
                info,
            },
        ),
        AuthOutcome::Locked { .. } => (
            StatusCode::FORBIDDEN,
            LoginResponse {
                error: None,
                identity: None,
                token: None,
                info,
            },
        ),
    }
}

/// warp handler for `POST /login`
pub async fn handle_login(
    credentials: Credentials,
    pipeline: Arc<AuthPipeline>,
    tokens: Arc<JwtTokenVerifier>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (status, body) = login(&credentials, &pipeline, &tokens).await;
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{CredentialProvider, LocalProvider};
    use crate::auth::throttle::{LoginThrottle, ThrottleConfig};

    async fn pipeline() -> AuthPipeline {
        let local = Arc::new(LocalProvider::new());
        local
            .add_user(AuthenticatedUser::new("u1", "alice"), "wonderland")
            .await
            .unwrap();
        let providers: Vec<Arc<dyn CredentialProvider>> = vec![local];
        AuthPipeline::new(providers, Arc::new(LoginThrottle::new(ThrottleConfig::default())))
    }

    #[tokio::test]
    async fn test_login_statuses() {
        let pipeline = pipeline().await;
        let tokens = JwtTokenVerifier::new("test-secret-key");

        let (status, body) = login(&Credentials::new("ALICE", "wonderland"), &pipeline, &tokens).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.token.is_some());

        for _ in 0..2 {
            let (status, _) = login(&Credentials::new("alice", "bad"), &pipeline, &tokens).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, body) = login(&Credentials::new("alice", "bad"), &pipeline, &tokens).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.info.locked);
    }
}
