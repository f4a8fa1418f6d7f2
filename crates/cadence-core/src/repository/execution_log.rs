//! Execution log repository trait definition.

use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionLog, LogOutcome};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only storage for per-attempt execution logs.
pub trait ExecutionLogRepository: Send + Sync {
    /// Insert a log entry (normally in `running` status).
    fn create_log(
        &self,
        log: &ExecutionLog,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Close a log entry with its outcome and timing.
    fn finish_log(
        &self,
        id: &Uuid,
        outcome: &LogOutcome,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent logs first, optionally restricted to one job.
    fn list_logs(
        &self,
        job_id: Option<&Uuid>,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionLog>, RepositoryError>> + Send;

    /// Step logs of one workflow execution, in the order they were started.
    fn list_logs_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionLog>, RepositoryError>> + Send;
}
