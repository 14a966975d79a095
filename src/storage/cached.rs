use crate::models::{Click, ClickMetadata, ClickWindowCounts, ClickWindows, CountDrift, Link, NewLink};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper that caches short-code lookups for the redirect path.
///
/// Only hits are cached, so a code created after a miss is visible at once.
/// Deleting a link evicts its code before the call returns. Cached links carry
/// the `click_count` they were read with; counters must be read by id.
///
/// A lookup that overlaps an eviction is not left in the cache: every eviction
/// bumps `evictions`, and a lookup that sees the counter move while it read
/// from the inner storage drops its own entry again.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    read_cache: Cache<String, Link>,
    evictions: AtomicU64,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, ttl_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(ttl_secs.max(1)))
            .build();

        Self {
            inner,
            read_cache,
            evictions: AtomicU64::new(0),
        }
    }

    async fn forget(&self, short_code: &str) {
        self.evictions.fetch_add(1, Ordering::AcqRel);
        self.read_cache.invalidate(short_code).await;
    }

    /// Number of cached short codes (approximate, for diagnostics)
    pub fn cached_entries(&self) -> u64 {
        self.read_cache.entry_count()
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert_link(&self, link: &NewLink) -> StorageResult<Link> {
        let created = self.inner.insert_link(link).await?;

        self.read_cache
            .insert(created.short_code.clone(), created.clone())
            .await;

        Ok(created)
    }

    async fn get_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        self.inner.get_link(id, tenant_id).await
    }

    async fn get_link_by_code(&self, short_code: &str) -> Result<Option<Link>> {
        if let Some(cached) = self.read_cache.get(short_code).await {
            return Ok(Some(cached));
        }

        let epoch = self.evictions.load(Ordering::Acquire);
        let result = self.inner.get_link_by_code(short_code).await?;

        if let Some(ref link) = result {
            self.read_cache
                .insert(short_code.to_string(), link.clone())
                .await;

            if self.evictions.load(Ordering::Acquire) != epoch {
                self.read_cache.invalidate(short_code).await;
            }
        }

        Ok(result)
    }

    async fn list_links(&self, tenant_id: &str) -> Result<Vec<Link>> {
        self.inner.list_links(tenant_id).await
    }

    async fn update_description(
        &self,
        id: &str,
        tenant_id: &str,
        description: Option<&str>,
    ) -> Result<Option<Link>> {
        let updated = self
            .inner
            .update_description(id, tenant_id, description)
            .await?;

        if let Some(ref link) = updated {
            self.forget(&link.short_code).await;
        }

        Ok(updated)
    }

    async fn delete_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        let deleted = self.inner.delete_link(id, tenant_id).await?;

        if let Some(ref link) = deleted {
            self.forget(&link.short_code).await;
        }

        Ok(deleted)
    }

    async fn evict_short_code(&self, short_code: &str) {
        self.forget(short_code).await;
    }

    async fn record_click(&self, link_id: &str, click: &ClickMetadata) -> Result<bool> {
        self.inner.record_click(link_id, click).await
    }

    async fn click_window_counts(
        &self,
        link_id: &str,
        windows: ClickWindows,
    ) -> Result<ClickWindowCounts> {
        self.inner.click_window_counts(link_id, windows).await
    }

    async fn recent_clicks(&self, link_id: &str, limit: i64) -> Result<Vec<Click>> {
        self.inner.recent_clicks(link_id, limit).await
    }

    async fn count_clicks(&self, link_id: &str) -> Result<i64> {
        self.inner.count_clicks(link_id).await
    }

    async fn count_orphan_clicks(&self) -> Result<i64> {
        self.inner.count_orphan_clicks().await
    }

    async fn click_count_drift(&self) -> Result<Vec<CountDrift>> {
        self.inner.click_count_drift().await
    }

    async fn reconcile_click_counts(&self) -> Result<u64> {
        self.inner.reconcile_click_counts().await
    }
}
