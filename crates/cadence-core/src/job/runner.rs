//! Standalone job execution.
//!
//! A job run is a single action attempt with an empty context. Success and
//! failure both update `lastRun`/`nextRun`; a failure additionally fires the
//! job's notification hook in the background.

use std::sync::Arc;

use cadence_types::error::RepositoryError;
use cadence_types::execution::LogOutcome;
use cadence_types::job::Job;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::action::ActionExecutor;
use crate::job::notifier::{FailureNotifier, JobFailure};
use crate::ledger::ExecutionLedger;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::job::JobRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::schedule::next_run;

/// Errors that prevent a job run from being recorded.
///
/// Action failures are not errors here; they are reported in
/// [`JobRunReport::outcome`].
#[derive(Debug, thiserror::Error)]
pub enum JobRunError {
    #[error("job bookkeeping failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of one job run.
#[derive(Debug, Clone)]
pub struct JobRunReport {
    pub job_id: Uuid,
    pub log_id: Uuid,
    pub outcome: LogOutcome,
    pub duration_ms: i64,
    pub last_run: DateTime<Utc>,
    pub next_run: Option<DateTime<Utc>>,
}

impl JobRunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, LogOutcome::Success(_))
    }
}

/// Runs standalone jobs and records their outcome.
pub struct JobRunner<J, W, L, A, N> {
    jobs: Arc<J>,
    ledger: ExecutionLedger<W, L>,
    actions: Arc<A>,
    notifier: Arc<N>,
    failure_template: String,
}

impl<J, W, L, A, N> JobRunner<J, W, L, A, N>
where
    J: JobRepository,
    W: WorkflowRepository,
    L: ExecutionLogRepository,
    A: ActionExecutor,
    N: FailureNotifier + 'static,
{
    pub fn new(
        jobs: Arc<J>,
        ledger: ExecutionLedger<W, L>,
        actions: Arc<A>,
        notifier: Arc<N>,
        failure_template: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            ledger,
            actions,
            notifier,
            failure_template: failure_template.into(),
        }
    }

    /// Execute the job's action once and record the attempt.
    pub async fn run(&self, job: &Job) -> Result<JobRunReport, JobRunError> {
        tracing::info!(job_id = %job.id, job = job.name.as_str(), kind = job.action.kind(), "running job");

        let log = self.ledger.open_job_log(job).await?;
        let log_id = log.id;

        let context = Value::Object(Map::new());
        let outcome = match self.actions.execute(&job.action, &context).await {
            Ok(output) => LogOutcome::Success(output),
            Err(e) => LogOutcome::Failure(e.to_string()),
        };
        let duration_ms = self.ledger.close_log(log, &outcome).await?;

        let finished = Utc::now();
        let next = match next_run(&job.cron_expression, finished) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "cannot compute next run");
                None
            }
        };
        match &outcome {
            LogOutcome::Success(_) => {
                tracing::info!(job_id = %job.id, duration_ms, "job succeeded");
            }
            LogOutcome::Failure(error) => {
                tracing::warn!(job_id = %job.id, duration_ms, error = error.as_str(), "job failed");
                self.notify_failure(job, error, finished);
            }
        }

        // Runs after the notification so a bookkeeping error cannot suppress it.
        self.jobs
            .update_run_times(&job.id, Some(finished), next)
            .await?;

        Ok(JobRunReport {
            job_id: job.id,
            log_id,
            outcome,
            duration_ms,
            last_run: finished,
            next_run: next,
        })
    }

    /// Fire-and-forget failure notification. Delivery errors are logged only.
    fn notify_failure(&self, job: &Job, error: &str, failed_at: DateTime<Utc>) {
        let Some(failure) = JobFailure::for_job(job, error, failed_at, &self.failure_template)
        else {
            return;
        };

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match notifier.notify(&failure).await {
                Ok(()) => tracing::debug!(job_id = %failure.job_id, "failure notification sent"),
                Err(e) => tracing::warn!(
                    job_id = %failure.job_id,
                    error = %e,
                    "failure notification could not be delivered"
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::testing::{
        InMemoryJobRepository, InMemoryLogRepository, InMemoryWorkflowRepository,
        RecordingNotifier, ScriptedExecutor, sample_job, script,
    };
    use cadence_types::execution::LogStatus;

    type Runner = JobRunner<
        InMemoryJobRepository,
        InMemoryWorkflowRepository,
        InMemoryLogRepository,
        ScriptedExecutor,
        RecordingNotifier,
    >;

    struct Harness {
        runner: Runner,
        jobs: Arc<InMemoryJobRepository>,
        logs: Arc<InMemoryLogRepository>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(job: &Job, executor: ScriptedExecutor, notifier: RecordingNotifier) -> Harness {
        let jobs = Arc::new(InMemoryJobRepository::with_jobs(vec![job.clone()]));
        let logs = Arc::new(InMemoryLogRepository::default());
        let notifier = Arc::new(notifier);
        let ledger = ExecutionLedger::new(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::clone(&logs),
        );
        let runner = JobRunner::new(
            Arc::clone(&jobs),
            ledger,
            Arc::new(executor),
            Arc::clone(&notifier),
            "{{job.name}}: {{error}}",
        );
        Harness {
            runner,
            jobs,
            logs,
            notifier,
        }
    }

    fn notifying_job(code: &str) -> Job {
        let mut job = sample_job("report");
        job.action = script(code);
        job.notify_on_failure = true;
        job.notify_webhook_url = Some("https://alerts.example.com".to_string());
        job
    }

    #[tokio::test]
    async fn success_records_log_and_run_times() {
        let job = sample_job("sync");
        let h = harness(&job, ScriptedExecutor::new().reply("sync", "done"), RecordingNotifier::default());

        let report = h.runner.run(&job).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.outcome, LogOutcome::Success("done".to_string()));

        let log = h.logs.get(&report.log_id).unwrap();
        assert_eq!(log.status, LogStatus::Success);
        assert_eq!(log.name, "sync");
        assert_eq!(log.output.as_deref(), Some("done"));

        let stored = h.jobs.get(&job.id).unwrap();
        assert_eq!(stored.last_run, Some(report.last_run));
        let next = stored.next_run.expect("next run computed");
        assert!(next > report.last_run);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn failure_records_error_and_notifies() {
        let job = notifying_job("explode");
        let h = harness(
            &job,
            ScriptedExecutor::new().fail("explode", "division by zero"),
            RecordingNotifier::default(),
        );

        let report = h.runner.run(&job).await.unwrap();
        assert!(!report.succeeded());

        let log = h.logs.get(&report.log_id).unwrap();
        assert_eq!(log.status, LogStatus::Failure);
        assert_eq!(log.error.as_deref(), Some("division by zero"));
        assert!(h.jobs.get(&job.id).unwrap().last_run.is_some());

        tokio::time::timeout(Duration::from_secs(2), h.notifier.notified.notified())
            .await
            .expect("notification sent");
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].job_id, job.id);
        assert_eq!(sent[0].message, "report: division by zero");
    }

    #[tokio::test]
    async fn notifier_errors_are_swallowed() {
        let job = notifying_job("explode");
        let h = harness(
            &job,
            ScriptedExecutor::new().fail("explode", "bad"),
            RecordingNotifier::failing(),
        );

        let report = h.runner.run(&job).await.unwrap();
        assert!(!report.succeeded());
        tokio::time::timeout(Duration::from_secs(2), h.notifier.notified.notified())
            .await
            .expect("notification attempted");
    }

    #[tokio::test]
    async fn failure_notifies_even_when_run_times_cannot_be_saved() {
        let job = notifying_job("explode");
        let h = harness(
            &job,
            ScriptedExecutor::new().fail("explode", "upstream down"),
            RecordingNotifier::default(),
        );
        h.jobs.fail_run_time_updates();

        let err = h.runner.run(&job).await.unwrap_err();
        assert!(matches!(err, JobRunError::Repository(_)));

        tokio::time::timeout(Duration::from_secs(2), h.notifier.notified.notified())
            .await
            .expect("notification sent");
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "report: upstream down");
    }

    #[tokio::test]
    async fn failure_without_webhook_does_not_notify() {
        let mut job = notifying_job("explode");
        job.notify_webhook_url = None;
        let h = harness(
            &job,
            ScriptedExecutor::new().fail("explode", "bad"),
            RecordingNotifier::default(),
        );

        h.runner.run(&job).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.notifier.sent().is_empty());
    }
}
