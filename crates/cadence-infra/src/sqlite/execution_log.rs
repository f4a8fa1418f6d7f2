//! SQLite execution log repository implementation.

use cadence_core::repository::execution_log::ExecutionLogRepository;
use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionLog, LogOutcome, LogStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_enum, parse_uuid, query_error};

const LOG_COLUMNS: &str = "id, job_id, workflow_execution_id, name, status, started_at, \
     completed_at, duration_ms, output, error";

/// SQLite-backed implementation of `ExecutionLogRepository`.
pub struct SqliteExecutionLogRepository {
    pool: DatabasePool,
}

impl SqliteExecutionLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct LogRow {
    id: String,
    job_id: Option<String>,
    workflow_execution_id: Option<String>,
    name: String,
    status: String,
    started_at: String,
    completed_at: Option<String>,
    duration_ms: Option<i64>,
    output: Option<String>,
    error: Option<String>,
}

impl LogRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            workflow_execution_id: row.try_get("workflow_execution_id")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            duration_ms: row.try_get("duration_ms")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
        })
    }

    fn into_log(self) -> Result<ExecutionLog, RepositoryError> {
        Ok(ExecutionLog {
            id: parse_uuid(&self.id)?,
            job_id: self.job_id.as_deref().map(parse_uuid).transpose()?,
            workflow_execution_id: self
                .workflow_execution_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?,
            name: self.name,
            status: parse_enum::<LogStatus>(&self.status)?,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            duration_ms: self.duration_ms,
            output: self.output,
            error: self.error,
        })
    }
}

fn parse_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ExecutionLog>, RepositoryError> {
    rows.iter()
        .map(|row| LogRow::from_row(row).map_err(query_error)?.into_log())
        .collect()
}

impl ExecutionLogRepository for SqliteExecutionLogRepository {
    async fn create_log(&self, log: &ExecutionLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO execution_logs
               (id, job_id, workflow_execution_id, name, status, started_at,
                completed_at, duration_ms, output, error)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(log.id.to_string())
        .bind(log.job_id.map(|id| id.to_string()))
        .bind(log.workflow_execution_id.map(|id| id.to_string()))
        .bind(&log.name)
        .bind(log.status.to_string())
        .bind(format_datetime(&log.started_at))
        .bind(log.completed_at.as_ref().map(format_datetime))
        .bind(log.duration_ms)
        .bind(&log.output)
        .bind(&log.error)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn finish_log(
        &self,
        id: &Uuid,
        outcome: &LogOutcome,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), RepositoryError> {
        let (output, error) = match outcome {
            LogOutcome::Success(output) => (Some(output.as_str()), None),
            LogOutcome::Failure(error) => (None, Some(error.as_str())),
        };

        let result = sqlx::query(
            r#"UPDATE execution_logs
               SET status = ?, completed_at = ?, duration_ms = ?, output = ?, error = ?
               WHERE id = ?"#,
        )
        .bind(outcome.status().to_string())
        .bind(format_datetime(&completed_at))
        .bind(duration_ms)
        .bind(output)
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_logs(
        &self,
        job_id: Option<&Uuid>,
        limit: u32,
    ) -> Result<Vec<ExecutionLog>, RepositoryError> {
        let rows = match job_id {
            Some(job_id) => {
                sqlx::query(&format!(
                    "SELECT {LOG_COLUMNS} FROM execution_logs WHERE job_id = ? \
                     ORDER BY started_at DESC, id DESC LIMIT ?"
                ))
                .bind(job_id.to_string())
                .bind(i64::from(limit))
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {LOG_COLUMNS} FROM execution_logs \
                     ORDER BY started_at DESC, id DESC LIMIT ?"
                ))
                .bind(i64::from(limit))
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(query_error)?;

        parse_rows(&rows)
    }

    async fn list_logs_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<ExecutionLog>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM execution_logs WHERE workflow_execution_id = ? \
             ORDER BY started_at ASC, id ASC"
        ))
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        parse_rows(&rows)
    }
}
