//! SQLite-backed storage with injectable faults, for unit tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::models::{Click, ClickMetadata, ClickWindowCounts, ClickWindows, CountDrift, Link, NewLink};
use crate::storage::{SqliteStorage, Storage, StorageResult};

/// Pauses the next short-code lookup after it has read from the database
#[derive(Clone, Default)]
pub struct LookupGate {
    armed: Arc<AtomicBool>,
    pub read_done: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl LookupGate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

pub struct FaultyStorage {
    inner: SqliteStorage,
    pub fail_clicks: AtomicBool,
    pub gate: LookupGate,
}

impl FaultyStorage {
    pub async fn new() -> Self {
        let inner = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
        inner.init().await.unwrap();
        Self {
            inner,
            fail_clicks: AtomicBool::new(false),
            gate: LookupGate::default(),
        }
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert_link(&self, link: &NewLink) -> StorageResult<Link> {
        self.inner.insert_link(link).await
    }

    async fn get_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        self.inner.get_link(id, tenant_id).await
    }

    async fn get_link_by_code(&self, short_code: &str) -> Result<Option<Link>> {
        let result = self.inner.get_link_by_code(short_code).await;
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.read_done.notify_one();
            self.gate.release.notified().await;
        }
        result
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
        self.inner.update_description(id, tenant_id, description).await
    }

    async fn delete_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        self.inner.delete_link(id, tenant_id).await
    }

    async fn record_click(&self, link_id: &str, click: &ClickMetadata) -> Result<bool> {
        if self.fail_clicks.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
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
