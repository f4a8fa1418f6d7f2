//! Cron scheduler wrapping `tokio-cron-scheduler` for job and workflow
//! triggers.
//!
//! Provides:
//! - Standard cron expression parsing (5-field, or 6-field with seconds)
//! - Human-readable schedule normalization ("every 5 minutes" -> cron)
//! - Next-occurrence computation for `nextRun` bookkeeping
//! - One trigger per definition, replaced on reschedule

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during scheduling operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Failed to create or manipulate a cron job.
    #[error("scheduler error: {0}")]
    JobError(String),

    /// Invalid cron expression or schedule string.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("scheduler not started")]
    NotStarted,
}

// ---------------------------------------------------------------------------
// Human-readable schedule normalization
// ---------------------------------------------------------------------------

/// Normalize a schedule string to a 6-field cron expression.
///
/// Supported patterns (case-insensitive):
/// - "every N seconds"     -> "*/N * * * * *"
/// - "every N minutes"     -> "0 */N * * * *"
/// - "every N hours"       -> "0 0 */N * * *"
/// - "every minute"        -> "0 * * * * *"
/// - "every hour"          -> "0 0 * * * *"
/// - "every day"           -> "0 0 0 * * *"
/// - "every day at HH:MM"  -> "0 MM HH * * *"
/// - "hourly"              -> "0 0 * * * *"
/// - "daily"               -> "0 0 0 * * *"
///
/// Five-field cron gets a leading `0` seconds field; six-field cron is
/// returned as-is.
pub fn normalize_schedule(input: &str) -> Result<String, SchedulerError> {
    let trimmed = input.trim();

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.len() == 5 {
        return Ok(format!("0 {}", parts.join(" ")));
    }
    if parts.len() == 6 {
        return Ok(parts.join(" "));
    }

    let lower = trimmed.to_lowercase();

    if lower == "every minute" || lower == "minutely" {
        return Ok("0 * * * * *".to_string());
    }
    if lower == "every hour" || lower == "hourly" {
        return Ok("0 0 * * * *".to_string());
    }
    if lower == "every day" || lower == "daily" {
        return Ok("0 0 0 * * *".to_string());
    }

    if let Some(rest) = lower.strip_prefix("every ") {
        if let Some(at_part) = rest.strip_prefix("day at ") {
            let invalid = || SchedulerError::InvalidSchedule(input.to_string());
            let (hour, minute) = at_part.split_once(':').ok_or_else(invalid)?;
            let hour: u32 = hour.trim().parse().map_err(|_| invalid())?;
            let minute: u32 = minute.trim().parse().map_err(|_| invalid())?;
            if hour < 24 && minute < 60 {
                return Ok(format!("0 {minute} {hour} * * *"));
            }
            return Err(invalid());
        }

        let words: Vec<&str> = rest.split_whitespace().collect();
        if let [count, unit] = words.as_slice() {
            let n: u32 = count
                .parse()
                .map_err(|_| SchedulerError::InvalidSchedule(input.to_string()))?;
            if n == 0 {
                return Err(SchedulerError::InvalidSchedule(
                    "interval must be > 0".to_string(),
                ));
            }
            return match unit.trim_end_matches('s') {
                "second" => Ok(format!("*/{n} * * * * *")),
                "minute" => Ok(format!("0 */{n} * * * *")),
                "hour" => Ok(format!("0 0 */{n} * * *")),
                _ => Err(SchedulerError::InvalidSchedule(input.to_string())),
            };
        }
    }

    Err(SchedulerError::InvalidSchedule(format!(
        "unrecognized schedule format: '{trimmed}'"
    )))
}

/// Parse a schedule into a cron matcher, validating it in the process.
pub fn parse_schedule(input: &str) -> Result<croner::Cron, SchedulerError> {
    let cron_expr = normalize_schedule(input)?;
    cron_expr
        .parse::<croner::Cron>()
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{input}: {e}")))
}

/// The first occurrence of `schedule` strictly after `from`.
pub fn next_run(schedule: &str, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, SchedulerError> {
    let cron = parse_schedule(schedule)?;
    Ok(cron.iter_after(from).next())
}

// ---------------------------------------------------------------------------
// CronScheduler
// ---------------------------------------------------------------------------

/// Identifies what a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKey {
    Job(Uuid),
    Workflow(Uuid),
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKey::Job(id) => write!(f, "job:{id}"),
            TriggerKey::Workflow(id) => write!(f, "workflow:{id}"),
        }
    }
}

/// Callback type invoked when a cron trigger fires.
pub type CronCallback = Arc<
    dyn Fn(TriggerKey, DateTime<Utc>) -> futures_util::future::BoxFuture<'static, ()>
        + Send
        + Sync,
>;

/// Tracks a registered cron trigger.
struct ScheduledTrigger {
    /// The job UUID assigned by tokio-cron-scheduler.
    job_id: Uuid,
    /// The normalized cron expression.
    cron_expr: String,
}

/// Cron scheduler that wraps `tokio-cron-scheduler::JobScheduler`.
///
/// Holds at most one trigger per [`TriggerKey`]. The trigger table is only
/// mutated under its write lock, always acquired after the scheduler lock.
pub struct CronScheduler {
    /// The underlying tokio-cron-scheduler instance.
    inner: Arc<RwLock<Option<JobScheduler>>>,
    /// Registered triggers keyed by definition.
    triggers: Arc<RwLock<HashMap<TriggerKey, ScheduledTrigger>>>,
}

impl CronScheduler {
    /// Create a new cron scheduler (not yet started).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
            triggers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start the scheduler. Must be called before scheduling.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;

        scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;

        let mut inner = self.inner.write().await;
        *inner = Some(scheduler);

        tracing::info!("cron scheduler started");
        Ok(())
    }

    /// Stop the scheduler and drop all triggers.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.write().await;
        if let Some(mut scheduler) = inner.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| SchedulerError::JobError(e.to_string()))?;
            tracing::info!("cron scheduler stopped");
        }
        let mut triggers = self.triggers.write().await;
        triggers.clear();
        Ok(())
    }

    /// Register a trigger, replacing any existing trigger for the same key.
    ///
    /// The `schedule` can be a cron expression or a human-readable string
    /// (see [`normalize_schedule`]). On error, the previous trigger (if any)
    /// is left in place.
    pub async fn schedule(
        &self,
        key: TriggerKey,
        schedule: &str,
        callback: CronCallback,
    ) -> Result<(), SchedulerError> {
        parse_schedule(schedule)?;
        let cron_expr = normalize_schedule(schedule)?;

        let inner = self.inner.read().await;
        let scheduler = inner.as_ref().ok_or(SchedulerError::NotStarted)?;

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _lock| {
            let cb = callback.clone();
            Box::pin(async move {
                let now = Utc::now();
                tracing::debug!(trigger = %key, %now, "cron trigger fired");
                cb(key, now).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        let mut triggers = self.triggers.write().await;

        // The new trigger is added before the old one is removed, so a failed
        // add leaves the definition with its previous trigger.
        let job_id = job.guid();
        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobError(e.to_string()))?;

        if let Some(previous) = triggers.get(&key) {
            if let Err(e) = scheduler.remove(&previous.job_id).await {
                if let Err(rollback) = scheduler.remove(&job_id).await {
                    tracing::error!(trigger = %key, %job_id, error = %rollback, "could not roll back new trigger");
                }
                return Err(SchedulerError::JobError(e.to_string()));
            }
            tracing::debug!(trigger = %key, cron = previous.cron_expr.as_str(), "replaced trigger");
        }

        tracing::info!(trigger = %key, %job_id, cron = cron_expr.as_str(), "trigger scheduled");
        triggers.insert(key, ScheduledTrigger { job_id, cron_expr });
        Ok(())
    }

    /// Remove a trigger. Returns `false` if none was registered.
    pub async fn unschedule(&self, key: TriggerKey) -> Result<bool, SchedulerError> {
        let inner = self.inner.read().await;
        let mut triggers = self.triggers.write().await;
        let Some(entry) = triggers.remove(&key) else {
            return Ok(false);
        };

        if let Some(scheduler) = inner.as_ref() {
            scheduler
                .remove(&entry.job_id)
                .await
                .map_err(|e| SchedulerError::JobError(e.to_string()))?;
        }

        tracing::info!(trigger = %key, "trigger unscheduled");
        Ok(true)
    }

    /// Whether [`start`](Self::start) has been called without a matching stop.
    pub async fn is_started(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub async fn is_scheduled(&self, key: TriggerKey) -> bool {
        self.triggers.read().await.contains_key(&key)
    }

    /// The normalized cron expression registered for `key`.
    pub async fn cron_expression(&self, key: TriggerKey) -> Option<String> {
        self.triggers
            .read()
            .await
            .get(&key)
            .map(|t| t.cron_expr.clone())
    }

    /// Get the number of registered triggers.
    pub async fn trigger_count(&self) -> usize {
        self.triggers.read().await.len()
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
