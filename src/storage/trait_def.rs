use crate::models::{Click, ClickMetadata, ClickWindowCounts, ClickWindows, CountDrift, Link, NewLink};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a link with `click_count = 0`.
    /// Fails with [`StorageError::Conflict`] when the short code is taken.
    async fn insert_link(&self, link: &NewLink) -> StorageResult<Link>;

    /// Get a link by id, only if it belongs to `tenant_id`
    async fn get_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>>;

    /// Get a link by its exact (case-sensitive) short code, across all tenants
    async fn get_link_by_code(&self, short_code: &str) -> Result<Option<Link>>;

    /// All links of a tenant, newest first
    async fn list_links(&self, tenant_id: &str) -> Result<Vec<Link>>;

    /// Replace the description of a tenant's link
    async fn update_description(
        &self,
        id: &str,
        tenant_id: &str,
        description: Option<&str>,
    ) -> Result<Option<Link>>;

    /// Delete a tenant's link and its clicks, returning the removed link
    async fn delete_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>>;

    /// Drop any cached lookup of `short_code`. Used when a code turns out to
    /// be gone, e.g. deleted by another process.
    async fn evict_short_code(&self, _short_code: &str) {}

    /// Insert a click row and increment the link's counter in one transaction.
    /// Returns `false` when the link no longer exists.
    async fn record_click(&self, link_id: &str, click: &ClickMetadata) -> Result<bool>;

    /// Click counts at or after each window start
    async fn click_window_counts(
        &self,
        link_id: &str,
        windows: ClickWindows,
    ) -> Result<ClickWindowCounts>;

    /// Most recent clicks of a link, newest first
    async fn recent_clicks(&self, link_id: &str, limit: i64) -> Result<Vec<Click>>;

    /// Number of click rows referencing a link
    async fn count_clicks(&self, link_id: &str) -> Result<i64>;

    /// Number of click rows whose link no longer exists
    async fn count_orphan_clicks(&self) -> Result<i64>;

    /// Links whose `click_count` differs from their click rows
    async fn click_count_drift(&self) -> Result<Vec<CountDrift>>;

    /// Reset every drifted `click_count` to its click-row count.
    /// Returns the number of links repaired.
    async fn reconcile_click_counts(&self) -> Result<u64>;
}
