use crate::models::{Click, ClickMetadata, ClickWindowCounts, ClickWindows, CountDrift, Link, NewLink};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

pub struct SqliteStorage {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid SQLite url '{database_url}'"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        if !database_url.contains(":memory:") {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .context("failed to open SQLite database")?;

        Ok(Self { pool })
    }

    /// Underlying connection pool, for maintenance tooling and tests
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id TEXT PRIMARY KEY,
                original_url TEXT NOT NULL,
                short_code TEXT NOT NULL UNIQUE,
                description TEXT,
                click_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                created_by_name TEXT NOT NULL,
                tenant_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                link_id TEXT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                clicked_at INTEGER NOT NULL,
                ip_address TEXT,
                user_agent TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_tenant_id ON links(tenant_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_link_id ON clicks(link_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_clicked_at ON clicks(clicked_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_link(&self, link: &NewLink) -> StorageResult<Link> {
        let inserted = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (id, original_url, short_code, description, click_count,
                               created_at, created_by, created_by_name, tenant_id)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
            ON CONFLICT(short_code) DO NOTHING
            RETURNING id, original_url, short_code, description, click_count,
                      created_at, created_by, created_by_name, tenant_id
            "#,
        )
        .bind(&link.id)
        .bind(&link.original_url)
        .bind(&link.short_code)
        .bind(&link.description)
        .bind(now_millis())
        .bind(&link.created_by)
        .bind(&link.created_by_name)
        .bind(&link.tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        inserted.ok_or(StorageError::Conflict)
    }

    async fn get_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, original_url, short_code, description, click_count,
                   created_at, created_by, created_by_name, tenant_id
            FROM links
            WHERE id = ? AND tenant_id = ?
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn get_link_by_code(&self, short_code: &str) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, original_url, short_code, description, click_count,
                   created_at, created_by, created_by_name, tenant_id
            FROM links
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn list_links(&self, tenant_id: &str) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, original_url, short_code, description, click_count,
                   created_at, created_by, created_by_name, tenant_id
            FROM links
            WHERE tenant_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    async fn update_description(
        &self,
        id: &str,
        tenant_id: &str,
        description: Option<&str>,
    ) -> Result<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET description = ?
            WHERE id = ? AND tenant_id = ?
            RETURNING id, original_url, short_code, description, click_count,
                      created_at, created_by, created_by_name, tenant_id
            "#,
        )
        .bind(description)
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn delete_link(&self, id: &str, tenant_id: &str) -> Result<Option<Link>> {
        // Click rows go with the link through ON DELETE CASCADE
        let link = sqlx::query_as::<_, Link>(
            r#"
            DELETE FROM links
            WHERE id = ? AND tenant_id = ?
            RETURNING id, original_url, short_code, description, click_count,
                      created_at, created_by, created_by_name, tenant_id
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    async fn record_click(&self, link_id: &str, click: &ClickMetadata) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The write comes first so the transaction takes the write lock up front
        let updated = sqlx::query(
            r#"
            UPDATE links
            SET click_count = click_count + 1
            WHERE id = ?
            "#,
        )
        .bind(link_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO clicks (link_id, clicked_at, ip_address, user_agent)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(link_id)
        .bind(now_millis())
        .bind(&click.ip_address)
        .bind(&click.user_agent)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn click_window_counts(
        &self,
        link_id: &str,
        windows: ClickWindows,
    ) -> Result<ClickWindowCounts> {
        let counts = sqlx::query_as::<_, ClickWindowCounts>(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN clicked_at >= ? THEN 1 ELSE 0 END), 0) AS today,
                COALESCE(SUM(CASE WHEN clicked_at >= ? THEN 1 ELSE 0 END), 0) AS week,
                COALESCE(SUM(CASE WHEN clicked_at >= ? THEN 1 ELSE 0 END), 0) AS month
            FROM clicks
            WHERE link_id = ?
            "#,
        )
        .bind(windows.today)
        .bind(windows.week)
        .bind(windows.month)
        .bind(link_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    async fn recent_clicks(&self, link_id: &str, limit: i64) -> Result<Vec<Click>> {
        let clicks = sqlx::query_as::<_, Click>(
            r#"
            SELECT id, link_id, clicked_at, ip_address, user_agent
            FROM clicks
            WHERE link_id = ?
            ORDER BY clicked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(link_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(clicks)
    }

    async fn count_clicks(&self, link_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clicks WHERE link_id = ?")
            .bind(link_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn count_orphan_clicks(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM clicks
            WHERE NOT EXISTS (SELECT 1 FROM links WHERE links.id = clicks.link_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn click_count_drift(&self) -> Result<Vec<CountDrift>> {
        let drift = sqlx::query_as::<_, CountDrift>(
            r#"
            SELECT l.id, l.short_code, l.click_count, COUNT(c.id) AS actual
            FROM links l
            LEFT JOIN clicks c ON c.link_id = l.id
            GROUP BY l.id, l.short_code, l.click_count
            HAVING l.click_count != COUNT(c.id)
            ORDER BY l.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(drift)
    }

    async fn reconcile_click_counts(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE links
            SET click_count = (SELECT COUNT(*) FROM clicks WHERE clicks.link_id = links.id)
            WHERE click_count != (SELECT COUNT(*) FROM clicks WHERE clicks.link_id = links.id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
