//! SQLite job repository implementation.
//!
//! The action configuration is stored as a JSON column; everything the
//! scheduler filters on (status, schedule, run times) is a plain column.

use cadence_core::repository::job::JobRepository;
use cadence_types::error::RepositoryError;
use cadence_types::job::{Job, JobStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_enum, parse_uuid, query_error};

const JOB_COLUMNS: &str = "id, name, cron_expression, status, action, last_run, next_run, \
     depends_on, notify_on_failure, notify_webhook_url, version, created_at, updated_at";

/// SQLite-backed implementation of `JobRepository`.
pub struct SqliteJobRepository {
    pool: DatabasePool,
}

impl SqliteJobRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &Uuid, pool: &sqlx::SqlitePool) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(pool)
            .await
            .map_err(query_error)?;

        row.map(|row| JobRow::from_row(&row).map_err(query_error)?.into_job())
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct JobRow {
    id: String,
    name: String,
    cron_expression: String,
    status: String,
    action: String,
    last_run: Option<String>,
    next_run: Option<String>,
    depends_on: Option<String>,
    notify_on_failure: bool,
    notify_webhook_url: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            cron_expression: row.try_get("cron_expression")?,
            status: row.try_get("status")?,
            action: row.try_get("action")?,
            last_run: row.try_get("last_run")?,
            next_run: row.try_get("next_run")?,
            depends_on: row.try_get("depends_on")?,
            notify_on_failure: row.try_get("notify_on_failure")?,
            notify_webhook_url: row.try_get("notify_webhook_url")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_job(self) -> Result<Job, RepositoryError> {
        let action = serde_json::from_str(&self.action)
            .map_err(|e| RepositoryError::Query(format!("invalid action JSON: {e}")))?;

        Ok(Job {
            id: parse_uuid(&self.id)?,
            name: self.name,
            cron_expression: self.cron_expression,
            status: parse_enum::<JobStatus>(&self.status)?,
            action,
            last_run: self.last_run.as_deref().map(parse_datetime).transpose()?,
            next_run: self.next_run.as_deref().map(parse_datetime).transpose()?,
            depends_on: self.depends_on.as_deref().map(parse_uuid).transpose()?,
            notify_on_failure: self.notify_on_failure,
            notify_webhook_url: self.notify_webhook_url,
            version: u32::try_from(self.version).unwrap_or(u32::MAX),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// JobRepository impl
// ---------------------------------------------------------------------------

impl JobRepository for SqliteJobRepository {
    async fn list_active_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'active' ORDER BY name ASC"
        ))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| JobRow::from_row(row).map_err(query_error)?.into_job())
            .collect()
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY name ASC"))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| JobRow::from_row(row).map_err(query_error)?.into_job())
            .collect()
    }

    async fn get_job(&self, id: &Uuid) -> Result<Option<Job>, RepositoryError> {
        self.fetch(id, &self.pool.reader).await
    }

    async fn save_job(&self, job: &Job) -> Result<Job, RepositoryError> {
        let action_json = serde_json::to_string(&job.action)
            .map_err(|e| RepositoryError::Query(format!("serialize action: {e}")))?;
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO jobs
               (id, name, cron_expression, status, action, last_run, next_run, depends_on,
                notify_on_failure, notify_webhook_url, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 cron_expression = excluded.cron_expression,
                 status = excluded.status,
                 action = excluded.action,
                 depends_on = excluded.depends_on,
                 notify_on_failure = excluded.notify_on_failure,
                 notify_webhook_url = excluded.notify_webhook_url,
                 version = jobs.version + 1,
                 updated_at = excluded.updated_at"#,
        )
        .bind(job.id.to_string())
        .bind(&job.name)
        .bind(&job.cron_expression)
        .bind(job.status.to_string())
        .bind(&action_json)
        .bind(job.last_run.as_ref().map(format_datetime))
        .bind(job.next_run.as_ref().map(format_datetime))
        .bind(job.depends_on.map(|id| id.to_string()))
        .bind(job.notify_on_failure)
        .bind(&job.notify_webhook_url)
        .bind(format_datetime(&job.created_at))
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        self.fetch(&job.id, &self.pool.writer)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_job(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_run_times(
        &self,
        id: &Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE jobs SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run.as_ref().map(format_datetime))
            .bind(next_run.as_ref().map(format_datetime))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
