//! Failure notification port for standalone jobs.

use cadence_types::job::Job;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::template::render;

/// Errors from delivering a failure notification. Always swallowed by the
/// caller after logging.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(String),

    #[error("notification endpoint returned HTTP {0}")]
    Status(u16),
}

/// Describes one failed job run, as posted to the job's failure webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_id: Uuid,
    pub job_name: String,
    #[serde(skip)]
    pub webhook_url: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
    /// Human-readable summary rendered from the failure template.
    pub message: String,
}

impl JobFailure {
    /// Build a failure notice, or `None` if the job has notification disabled.
    ///
    /// `template` is rendered in rich mode with `job`, `error` and `failedAt`.
    pub fn for_job(job: &Job, error: &str, failed_at: DateTime<Utc>, template: &str) -> Option<Self> {
        let webhook_url = job.failure_webhook()?.to_string();
        let vars = json!({
            "job": job,
            "error": error,
            "failedAt": failed_at.to_rfc3339(),
        });
        Some(Self {
            job_id: job.id,
            job_name: job.name.clone(),
            webhook_url,
            error: error.to_string(),
            failed_at,
            message: render(template, &vars),
        })
    }
}

/// Delivers job failure notices.
pub trait FailureNotifier: Send + Sync {
    fn notify(
        &self,
        failure: &JobFailure,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}
