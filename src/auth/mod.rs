pub mod dev;
pub mod oidc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMode};

pub use dev::DevVerifier;
pub use oidc::OidcVerifier;

/// Verified caller identity. Tenant and creator fields of new links come
/// from here, never from request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub tenant_id: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,
    #[error("{0}")]
    InvalidToken(String),
}

/// Turns a bearer token into an [`Identity`]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

pub struct AuthService {
    verifier: Arc<dyn IdentityVerifier>,
    token_required: bool,
}

impl AuthService {
    pub async fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        match config.mode {
            AuthMode::None => Ok(Self::development(Identity {
                tenant_id: config.dev_identity.tenant_id.clone(),
                user_id: config.dev_identity.user_id.clone(),
                display_name: config.dev_identity.display_name.clone(),
            })),
            AuthMode::Oauth => {
                let oauth = config
                    .oauth
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("OAuth mode requires OAuth configuration"))?;
                let verifier = OidcVerifier::from_config(oauth).await?;
                Ok(Self::with_verifier(Arc::new(verifier)))
            }
        }
    }

    /// Every request must carry a bearer token accepted by `verifier`
    pub fn with_verifier(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            verifier,
            token_required: true,
        }
    }

    /// Every request is treated as `identity`, with or without a token
    pub fn development(identity: Identity) -> Self {
        Self {
            verifier: Arc::new(DevVerifier::new(identity)),
            token_required: false,
        }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(_) if !self.token_required => "",
            Err(e) => return Err(e),
        };

        self.verifier.verify(token).await
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Rejects unauthenticated requests and stores the caller's [`Identity`]
/// in the request extensions.
pub async fn require_identity(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected unauthenticated request");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct FixedToken;

    #[async_trait]
    impl IdentityVerifier for FixedToken {
        async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
            if token == "good" {
                Ok(Identity {
                    tenant_id: "t1".to_string(),
                    user_id: "u1".to_string(),
                    display_name: "User".to_string(),
                })
            } else {
                Err(AuthError::InvalidToken("bad token".to_string()))
            }
        }
    }

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers_with("bearer  abc ")).unwrap(), "abc");
        assert!(matches!(
            bearer_token(&headers_with("Basic abc")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Bearer")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn token_required_with_real_verifier() {
        let service = AuthService::with_verifier(Arc::new(FixedToken));

        assert!(matches!(
            service.authenticate(&HeaderMap::new()).await,
            Err(AuthError::MissingToken)
        ));
        assert!(service
            .authenticate(&headers_with("Bearer nope"))
            .await
            .is_err());
        let identity = service
            .authenticate(&headers_with("Bearer good"))
            .await
            .unwrap();
        assert_eq!(identity.tenant_id, "t1");
    }

    #[tokio::test]
    async fn development_mode_accepts_missing_token() {
        let identity = Identity {
            tenant_id: "dev-tenant".to_string(),
            user_id: "dev-user".to_string(),
            display_name: "Dev".to_string(),
        };
        let service = AuthService::development(identity.clone());

        assert_eq!(service.authenticate(&HeaderMap::new()).await.unwrap(), identity);
        assert_eq!(
            service
                .authenticate(&headers_with("Bearer whatever"))
                .await
                .unwrap(),
            identity
        );
    }
}
