//! Execution ledger: bookkeeping for action attempts and workflow runs.
//!
//! Wraps the workflow and execution-log repositories with a higher-level API.
//! Every attempt gets an [`ExecutionLog`] opened before the side effect and
//! closed with its outcome; every workflow run gets a [`WorkflowExecution`]
//! whose context snapshot is refreshed as steps are entered.

use std::sync::Arc;
use std::time::Instant;

use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionLog, ExecutionStatus, LogOutcome, WorkflowExecution};
use cadence_types::job::Job;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::workflow::WorkflowRepository;

/// An execution log that has been opened but not yet closed.
#[derive(Debug)]
pub struct OpenLog {
    pub id: Uuid,
    started: Instant,
}

/// Records execution attempts and workflow runs.
///
/// Generic over the repositories so it works with any storage backend
/// (SQLite, in-memory fakes, etc.).
pub struct ExecutionLedger<W, L> {
    workflows: Arc<W>,
    logs: Arc<L>,
}

impl<W, L> Clone for ExecutionLedger<W, L> {
    fn clone(&self) -> Self {
        Self {
            workflows: Arc::clone(&self.workflows),
            logs: Arc::clone(&self.logs),
        }
    }
}

impl<W: WorkflowRepository, L: ExecutionLogRepository> ExecutionLedger<W, L> {
    pub fn new(workflows: Arc<W>, logs: Arc<L>) -> Self {
        Self { workflows, logs }
    }

    pub fn workflows(&self) -> &W {
        &self.workflows
    }

    pub fn logs(&self) -> &L {
        &self.logs
    }

    // -----------------------------------------------------------------------
    // Attempt logs
    // -----------------------------------------------------------------------

    /// Open a log for a standalone job run.
    pub async fn open_job_log(&self, job: &Job) -> Result<OpenLog, RepositoryError> {
        self.open(ExecutionLog::for_job(job.id, job.name.clone()))
            .await
    }

    /// Open a log named `"<workflow> > <step>"` for a workflow step.
    pub async fn open_step_log(
        &self,
        execution_id: Uuid,
        workflow_name: &str,
        step_name: &str,
    ) -> Result<OpenLog, RepositoryError> {
        self.open(ExecutionLog::for_step(execution_id, workflow_name, step_name))
            .await
    }

    async fn open(&self, log: ExecutionLog) -> Result<OpenLog, RepositoryError> {
        self.logs.create_log(&log).await?;
        tracing::debug!(log_id = %log.id, name = log.name.as_str(), "opened execution log");
        Ok(OpenLog {
            id: log.id,
            started: Instant::now(),
        })
    }

    /// Close a log with its outcome. Returns the measured duration in ms.
    pub async fn close_log(
        &self,
        log: OpenLog,
        outcome: &LogOutcome,
    ) -> Result<i64, RepositoryError> {
        let duration_ms = i64::try_from(log.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.logs
            .finish_log(&log.id, outcome, Utc::now(), duration_ms)
            .await?;
        tracing::debug!(
            log_id = %log.id,
            status = %outcome.status(),
            duration_ms,
            "closed execution log"
        );
        Ok(duration_ms)
    }

    // -----------------------------------------------------------------------
    // Workflow runs
    // -----------------------------------------------------------------------

    /// Insert a new `running` execution.
    ///
    /// Storage rejects the insert with `Conflict` if the workflow already has
    /// a running execution.
    pub async fn begin_run(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        self.workflows.create_execution(execution).await?;
        tracing::debug!(
            run_id = %execution.id,
            workflow_id = %execution.workflow_id,
            "recorded run start"
        );
        Ok(())
    }

    /// Persist the step being entered together with the context so far.
    pub async fn record_progress(
        &self,
        run_id: Uuid,
        step_order: i32,
        context: &Value,
    ) -> Result<(), RepositoryError> {
        self.workflows
            .update_execution_progress(&run_id, step_order, context)
            .await
    }

    pub async fn complete_run(&self, run_id: Uuid, context: &Value) -> Result<(), RepositoryError> {
        self.workflows
            .finish_execution(&run_id, ExecutionStatus::Completed, context, None)
            .await?;
        tracing::debug!(run_id = %run_id, "recorded run completed");
        Ok(())
    }

    pub async fn fail_run(
        &self,
        run_id: Uuid,
        context: &Value,
        error: &str,
    ) -> Result<(), RepositoryError> {
        self.workflows
            .finish_execution(&run_id, ExecutionStatus::Failed, context, Some(error))
            .await?;
        tracing::debug!(run_id = %run_id, error, "recorded run failed");
        Ok(())
    }
}
