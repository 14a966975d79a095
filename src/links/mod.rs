//! Link registry: creation, listing, lookup, update and deletion of a
//! tenant's links.

use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::Identity;
use crate::config::ShortCodeConfig;
use crate::error::{LinkError, LinkResult};
use crate::models::{CreateLinkRequest, Link, NewLink};
use crate::shortcode::{is_reserved, validate_custom_code, CodeGenerator};
use crate::storage::{Storage, StorageError};

pub struct LinkRegistry {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn CodeGenerator>,
    max_code_length: usize,
    max_attempts: u32,
}

impl LinkRegistry {
    pub fn new(
        storage: Arc<dyn Storage>,
        generator: Arc<dyn CodeGenerator>,
        config: &ShortCodeConfig,
    ) -> Self {
        Self {
            storage,
            generator,
            max_code_length: config.max_length,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Create a link owned by `identity`'s tenant.
    ///
    /// A custom code is used verbatim (after trimming) and fails with
    /// [`LinkError::Conflict`] when taken. Otherwise codes are generated and
    /// inserted until one sticks; the insert is the uniqueness check.
    pub async fn create(&self, request: CreateLinkRequest, identity: &Identity) -> LinkResult<Link> {
        let original_url = validate_url(&request.original_url)?;
        let custom_code = request
            .custom_short_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        if let Some(code) = custom_code {
            validate_custom_code(code, self.max_code_length)
                .map_err(|e| LinkError::Validation(e.to_string()))?;

            let new_link = self.new_link(&original_url, code, request.description, identity);
            return match self.storage.insert_link(&new_link).await {
                Ok(link) => {
                    info!(tenant_id = %link.tenant_id, short_code = %link.short_code, "created link with custom code");
                    Ok(link)
                }
                Err(StorageError::Conflict) => Err(LinkError::Conflict(format!(
                    "Short code '{code}' is already in use"
                ))),
                Err(StorageError::Other(e)) => Err(LinkError::Internal(e)),
            };
        }

        for attempt in 0..self.max_attempts {
            let code = self.generator.generate(attempt);
            if is_reserved(&code) {
                continue;
            }

            let new_link =
                self.new_link(&original_url, &code, request.description.clone(), identity);
            match self.storage.insert_link(&new_link).await {
                Ok(link) => {
                    info!(
                        tenant_id = %link.tenant_id,
                        short_code = %link.short_code,
                        generator = self.generator.name(),
                        attempts = attempt + 1,
                        "created link"
                    );
                    return Ok(link);
                }
                Err(StorageError::Conflict) => {
                    debug!(short_code = %code, attempt, "generated short code collided, retrying");
                }
                Err(StorageError::Other(e)) => return Err(LinkError::Internal(e)),
            }
        }

        warn!(
            attempts = self.max_attempts,
            generator = self.generator.name(),
            "short code space exhausted"
        );
        Err(LinkError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    pub async fn list(&self, tenant_id: &str) -> LinkResult<Vec<Link>> {
        Ok(self.storage.list_links(tenant_id).await?)
    }

    pub async fn get(&self, id: &str, tenant_id: &str) -> LinkResult<Link> {
        self.storage
            .get_link(id, tenant_id)
            .await?
            .ok_or(LinkError::NotFound)
    }

    /// Replace the description; `None` clears it
    pub async fn update(
        &self,
        id: &str,
        tenant_id: &str,
        description: Option<String>,
    ) -> LinkResult<Link> {
        self.storage
            .update_description(id, tenant_id, description.as_deref())
            .await?
            .ok_or(LinkError::NotFound)
    }

    pub async fn delete(&self, id: &str, tenant_id: &str) -> LinkResult<()> {
        let deleted = self
            .storage
            .delete_link(id, tenant_id)
            .await?
            .ok_or(LinkError::NotFound)?;

        info!(tenant_id = %tenant_id, short_code = %deleted.short_code, "deleted link");
        Ok(())
    }

    fn new_link(
        &self,
        original_url: &str,
        short_code: &str,
        description: Option<String>,
        identity: &Identity,
    ) -> NewLink {
        NewLink {
            id: uuid::Uuid::new_v4().simple().to_string(),
            original_url: original_url.to_string(),
            short_code: short_code.to_string(),
            description,
            created_by: identity.user_id.clone(),
            created_by_name: identity.display_name.clone(),
            tenant_id: identity.tenant_id.clone(),
        }
    }
}

/// Absolute http(s) URL with a host. Returned trimmed, otherwise as given.
pub fn validate_url(raw: &str) -> LinkResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LinkError::Validation("URL cannot be empty".to_string()));
    }

    let parsed =
        Url::parse(trimmed).map_err(|e| LinkError::Validation(format!("Invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LinkError::Validation(
            "Invalid URL: only http and https are supported".to_string(),
        ));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(LinkError::Validation("Invalid URL: missing host".to_string()));
    }

    Ok(trimmed.to_string())
}
