//! Posts job failure notices to the job's configured webhook.

use cadence_core::job::{FailureNotifier, JobFailure, NotifyError};

/// `FailureNotifier` that POSTs the notice as JSON.
#[derive(Clone)]
pub struct WebhookFailureNotifier {
    client: reqwest::Client,
}

impl WebhookFailureNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl FailureNotifier for WebhookFailureNotifier {
    async fn notify(&self, failure: &JobFailure) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&failure.webhook_url)
            .json(failure)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        tracing::debug!(
            job_id = %failure.job_id,
            status = status.as_u16(),
            "failure notification delivered"
        );
        Ok(())
    }
}
