//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{JobRow, JobUpdate, TemplateRow, TemplateVersionRow};
use crate::repos::{JobRepo, TemplateRepo, VersionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: TemplateRepo + VersionRepo + JobRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and run migrations.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MetadataError::Config(format!("create db directory: {e}")))?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(MetadataError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under server
            // concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_versions (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
                version_number INTEGER NOT NULL,
                object_key TEXT NOT NULL,
                file_size INTEGER,
                file_hash TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_template_versions_unique \
             ON template_versions(template_id, version_number)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_type TEXT NOT NULL,
                template_id TEXT NOT NULL,
                version_number INTEGER,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_template ON jobs(template_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
                event TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateRepo for SqliteStore {
    async fn create_template(&self, template: &TemplateRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(MetadataError::from_sqlx)?;
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> MetadataResult<Option<TemplateRow>> {
        let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_templates(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> MetadataResult<Vec<TemplateRow>> {
        let rows = match search {
            Some(search) => {
                sqlx::query_as::<_, TemplateRow>(
                    "SELECT * FROM templates WHERE name LIKE ? \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(format!("%{search}%"))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TemplateRow>(
                    "SELECT * FROM templates ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl VersionRepo for SqliteStore {
    async fn create_version(&self, version: &TemplateVersionRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO template_versions (
                id, template_id, version_number, object_key,
                file_size, file_hash, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(version.id)
        .bind(version.template_id)
        .bind(version.version_number)
        .bind(&version.object_key)
        .bind(version.file_size)
        .bind(&version.file_hash)
        .bind(version.created_at)
        .execute(&self.pool)
        .await
        .map_err(MetadataError::from_sqlx)?;
        Ok(())
    }

    async fn get_version(
        &self,
        template_id: Uuid,
        version_number: i64,
    ) -> MetadataResult<Option<TemplateVersionRow>> {
        let row = sqlx::query_as::<_, TemplateVersionRow>(
            "SELECT * FROM template_versions WHERE template_id = ? AND version_number = ?",
        )
        .bind(template_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_versions(&self, template_id: Uuid) -> MetadataResult<Vec<TemplateVersionRow>> {
        let rows = sqlx::query_as::<_, TemplateVersionRow>(
            "SELECT * FROM template_versions WHERE template_id = ? ORDER BY version_number DESC",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl JobRepo for SqliteStore {
    async fn create_job(
        &self,
        job_type: &str,
        template_id: Uuid,
        version_number: Option<i64>,
        status: &str,
        progress: i64,
        started_at: OffsetDateTime,
        metadata: &str,
    ) -> MetadataResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                job_type, template_id, version_number, status,
                progress, started_at, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_type)
        .bind(template_id)
        .bind(version_number)
        .bind(status)
        .bind(progress)
        .bind(started_at)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_job(&self, id: i64, update: &JobUpdate) -> MetadataResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                status = COALESCE(?, status),
                progress = COALESCE(?, progress),
                error_message = COALESCE(?, error_message),
                completed_at = COALESCE(?, completed_at)
            WHERE id = ?
            "#,
        )
        .bind(&update.status)
        .bind(update.progress)
        .bind(&update.error_message)
        .bind(update.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: i64) -> MetadataResult<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_jobs(&self, limit: i64, offset: i64) -> MetadataResult<Vec<JobRow>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
