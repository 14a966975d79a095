use async_trait::async_trait;

use super::{AuthError, Identity, IdentityVerifier};

/// Accepts any token and answers with a fixed identity. Only for local
/// development with `AUTH_MODE=none`.
pub struct DevVerifier {
    identity: Identity,
}

impl DevVerifier {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl IdentityVerifier for DevVerifier {
    async fn verify(&self, _token: &str) -> Result<Identity, AuthError> {
        tracing::trace!(tenant_id = %self.identity.tenant_id, "using development identity");
        Ok(self.identity.clone())
    }
}
