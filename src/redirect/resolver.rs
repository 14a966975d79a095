use std::sync::Arc;
use tracing::debug;

use crate::analytics::ClickRecorder;
use crate::error::{LinkError, LinkResult};
use crate::models::ClickMetadata;
use crate::storage::Storage;

/// Turns a short code into its destination and records the click
pub struct RedirectResolver {
    storage: Arc<dyn Storage>,
    recorder: Arc<ClickRecorder>,
}

impl RedirectResolver {
    pub fn new(storage: Arc<dyn Storage>, recorder: Arc<ClickRecorder>) -> Self {
        Self { storage, recorder }
    }

    /// Exact, case-sensitive lookup across all tenants. Deleted and unknown
    /// codes are both [`LinkError::NotFound`].
    ///
    /// A cached hit whose link is gone by the time the click is written is a
    /// miss too; the stale entry is evicted.
    pub async fn resolve(&self, short_code: &str, click: ClickMetadata) -> LinkResult<String> {
        let link = self
            .storage
            .get_link_by_code(short_code)
            .await?
            .ok_or(LinkError::NotFound)?;

        if !self.recorder.record(&link.id, &link.short_code, click).await {
            self.storage.evict_short_code(short_code).await;
            debug!(short_code, link_id = %link.id, "short code pointed at a deleted link");
            return Err(LinkError::NotFound);
        }

        debug!(short_code, link_id = %link.id, "resolved short code");
        Ok(link.original_url)
    }

    pub fn recorder(&self) -> &Arc<ClickRecorder> {
        &self.recorder
    }
}
