//! Scheduler service: owns the cron triggers and dispatches runs.
//!
//! The engine ties the definition repositories, the job runner and the
//! workflow interpreter to one [`CronScheduler`]. It keeps exactly one
//! trigger per active cron-bearing definition and exposes the manual,
//! webhook and query entry points used by the CLI and HTTP surface.
//!
//! Trigger callbacks hold a `Weak` reference to the engine so that dropping
//! the last `Arc<Engine>` is enough to stop dispatching.

use std::sync::{Arc, Weak};

use cadence_types::config::EngineConfig;
use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionLog, WorkflowExecution};
use cadence_types::job::Job;
use cadence_types::workflow::Workflow;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::action::ActionExecutor;
use crate::job::notifier::FailureNotifier;
use crate::job::runner::{JobRunError, JobRunReport, JobRunner};
use crate::ledger::ExecutionLedger;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::job::JobRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::schedule::{CronCallback, CronScheduler, SchedulerError, TriggerKey, next_run};
use crate::workflow::interpreter::{
    DEFAULT_MAX_STEP_VISITS, InterpreterError, RunOutcome, RunTrigger, WorkflowInterpreter,
};

// ---------------------------------------------------------------------------
// Error and settings
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    #[error(transparent)]
    JobRun(#[from] JobRunError),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("workflow {0} is paused")]
    WorkflowInactive(Uuid),

    #[error("no active workflow for this webhook token")]
    UnknownWebhook,

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),
}

/// Engine tunables derived from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_step_visits: u32,
    pub failure_template: String,
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_step_visits: config.workflow.max_step_visits,
            failure_template: config.notifications.failure_template.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_step_visits: DEFAULT_MAX_STEP_VISITS,
            failure_template: EngineConfig::default().notifications.failure_template,
        }
    }
}

/// Summary of the startup rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartReport {
    pub jobs_scheduled: usize,
    pub workflows_scheduled: usize,
    /// Definitions whose schedule could not be registered.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine<J, W, L, A, N> {
    jobs: Arc<J>,
    workflows: Arc<W>,
    logs: Arc<L>,
    runner: JobRunner<J, W, L, A, N>,
    interpreter: WorkflowInterpreter<W, L, A>,
    scheduler: CronScheduler,
    shutdown: CancellationToken,
}

impl<J, W, L, A, N> Engine<J, W, L, A, N>
where
    J: JobRepository + 'static,
    W: WorkflowRepository + 'static,
    L: ExecutionLogRepository + 'static,
    A: ActionExecutor + 'static,
    N: FailureNotifier + 'static,
{
    pub fn new(
        jobs: Arc<J>,
        workflows: Arc<W>,
        logs: Arc<L>,
        actions: Arc<A>,
        notifier: Arc<N>,
        settings: EngineSettings,
    ) -> Self {
        let ledger = ExecutionLedger::new(Arc::clone(&workflows), Arc::clone(&logs));
        let runner = JobRunner::new(
            Arc::clone(&jobs),
            ledger.clone(),
            Arc::clone(&actions),
            notifier,
            settings.failure_template,
        );
        let interpreter =
            WorkflowInterpreter::new(ledger, actions).with_max_step_visits(settings.max_step_visits);

        Self {
            jobs,
            workflows,
            logs,
            runner,
            interpreter,
            scheduler: CronScheduler::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn jobs(&self) -> &J {
        &self.jobs
    }

    pub fn workflows(&self) -> &W {
        &self.workflows
    }

    pub fn scheduler(&self) -> &CronScheduler {
        &self.scheduler
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the scheduler and register every active definition.
    ///
    /// A definition with a malformed schedule is logged and skipped; it does
    /// not prevent the others from being scheduled.
    pub async fn start(self: &Arc<Self>) -> Result<StartReport, EngineError> {
        self.scheduler.start().await?;
        let mut report = StartReport::default();

        for job in self.jobs.list_active_jobs().await? {
            match self.schedule_job(&job).await {
                Ok(()) => report.jobs_scheduled += 1,
                Err(e) => {
                    tracing::warn!(job_id = %job.id, job = job.name.as_str(), error = %e, "skipping job with invalid schedule");
                    report.skipped += 1;
                }
            }
        }

        for workflow in self.workflows.list_active_workflows().await? {
            let Some(expr) = workflow.schedule() else {
                continue;
            };
            match self.schedule_workflow(workflow.id, expr).await {
                Ok(()) => report.workflows_scheduled += 1,
                Err(e) => {
                    tracing::warn!(workflow_id = %workflow.id, workflow = workflow.name.as_str(), error = %e, "skipping workflow with invalid schedule");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            jobs = report.jobs_scheduled,
            workflows = report.workflows_scheduled,
            skipped = report.skipped,
            "engine started"
        );
        Ok(report)
    }

    /// Cancel in-flight runs at their next step boundary and drop all triggers.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.shutdown.cancel();
        self.scheduler.stop().await?;
        tracing::info!("engine stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Definition hooks
    // -----------------------------------------------------------------------

    /// Persist a job definition and bring its trigger in line with it.
    pub async fn save_job(self: &Arc<Self>, job: &Job) -> Result<Job, EngineError> {
        validate_job(job)?;
        let saved = self.jobs.save_job(job).await?;
        self.job_saved(&saved).await?;
        Ok(saved)
    }

    /// Add, replace or remove the job's trigger according to its status.
    ///
    /// Before [`start`](Self::start) only `nextRun` is updated.
    pub async fn job_saved(self: &Arc<Self>, job: &Job) -> Result<(), EngineError> {
        if !job.is_schedulable() {
            self.scheduler.unschedule(TriggerKey::Job(job.id)).await?;
            self.jobs.update_run_times(&job.id, job.last_run, None).await?;
            return Ok(());
        }
        if self.scheduler.is_started().await {
            self.schedule_job(job).await
        } else {
            let next = next_run(&job.cron_expression, Utc::now())?;
            self.jobs.update_run_times(&job.id, job.last_run, next).await?;
            Ok(())
        }
    }

    pub async fn delete_job(&self, id: &Uuid) -> Result<bool, EngineError> {
        self.job_deleted(id).await?;
        Ok(self.jobs.delete_job(id).await?)
    }

    pub async fn job_deleted(&self, id: &Uuid) -> Result<(), EngineError> {
        self.scheduler.unschedule(TriggerKey::Job(*id)).await?;
        Ok(())
    }

    /// Persist a workflow definition and bring its trigger in line with it.
    pub async fn save_workflow(self: &Arc<Self>, workflow: &Workflow) -> Result<(), EngineError> {
        validate_workflow(workflow)?;
        self.workflows.save_workflow(workflow).await?;
        self.workflow_saved(workflow).await
    }

    pub async fn workflow_saved(self: &Arc<Self>, workflow: &Workflow) -> Result<(), EngineError> {
        let started = self.scheduler.is_started().await;
        match workflow.schedule() {
            Some(expr) if started => self.schedule_workflow(workflow.id, expr).await,
            Some(_) => Ok(()),
            None => {
                self.scheduler
                    .unschedule(TriggerKey::Workflow(workflow.id))
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn delete_workflow(&self, id: &Uuid) -> Result<bool, EngineError> {
        self.workflow_deleted(id).await?;
        Ok(self.workflows.delete_workflow(id).await?)
    }

    pub async fn workflow_deleted(&self, id: &Uuid) -> Result<(), EngineError> {
        self.scheduler.unschedule(TriggerKey::Workflow(*id)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Run a job once, outside its schedule.
    pub async fn run_job_now(&self, id: &Uuid) -> Result<JobRunReport, EngineError> {
        let job = self
            .jobs
            .get_job(id)
            .await?
            .ok_or(EngineError::JobNotFound(*id))?;
        Ok(self.runner.run(&job).await?)
    }

    /// Start a manual run. A payload seeds the context like a webhook body.
    pub async fn run_workflow(
        &self,
        id: &Uuid,
        payload: Option<Value>,
    ) -> Result<RunOutcome, EngineError> {
        let workflow = self
            .workflows
            .get_workflow(id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(*id))?;
        if !workflow.is_active() {
            return Err(EngineError::WorkflowInactive(*id));
        }
        let trigger = RunTrigger {
            payload,
            ..RunTrigger::manual()
        };
        let cancel = self.shutdown.child_token();
        Ok(self.interpreter.run(&workflow, trigger, &cancel).await?)
    }

    /// Start a webhook-triggered run with `payload` as the initial context.
    pub async fn trigger_webhook(
        &self,
        token: &str,
        payload: Value,
    ) -> Result<RunOutcome, EngineError> {
        let workflow = match self.workflows.get_workflow_by_webhook_token(token).await? {
            Some(workflow) if workflow.is_active() => workflow,
            _ => return Err(EngineError::UnknownWebhook),
        };
        tracing::info!(workflow_id = %workflow.id, "webhook received");
        let cancel = self.shutdown.child_token();
        Ok(self
            .interpreter
            .run(&workflow, RunTrigger::webhook(payload), &cancel)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Most recent logs first, optionally restricted to one job.
    pub async fn recent_logs(
        &self,
        job_id: Option<&Uuid>,
        limit: u32,
    ) -> Result<Vec<ExecutionLog>, EngineError> {
        Ok(self.logs.list_logs(job_id, limit).await?)
    }

    pub async fn executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, EngineError> {
        Ok(self.workflows.list_executions(workflow_id, limit).await?)
    }

    /// Step logs of one execution in the order they ran.
    pub async fn execution_logs(&self, execution_id: &Uuid) -> Result<Vec<ExecutionLog>, EngineError> {
        Ok(self.logs.list_logs_for_execution(execution_id).await?)
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    async fn schedule_job(self: &Arc<Self>, job: &Job) -> Result<(), EngineError> {
        self.scheduler
            .schedule(TriggerKey::Job(job.id), &job.cron_expression, self.callback())
            .await?;
        let next = next_run(&job.cron_expression, Utc::now())?;
        self.jobs.update_run_times(&job.id, job.last_run, next).await?;
        Ok(())
    }

    async fn schedule_workflow(self: &Arc<Self>, id: Uuid, expr: &str) -> Result<(), EngineError> {
        self.scheduler
            .schedule(TriggerKey::Workflow(id), expr, self.callback())
            .await?;
        Ok(())
    }

    fn callback(self: &Arc<Self>) -> CronCallback {
        let engine: Weak<Self> = Arc::downgrade(self);
        Arc::new(
            move |key: TriggerKey, fired_at: DateTime<Utc>| -> BoxFuture<'static, ()> {
                let engine = engine.clone();
                Box::pin(async move {
                    if let Some(engine) = engine.upgrade() {
                        engine.on_tick(key, fired_at).await;
                    }
                })
            },
        )
    }

    /// Dispatch one trigger firing. The run itself proceeds in its own task,
    /// so a slow run never delays the next tick.
    async fn on_tick(self: Arc<Self>, key: TriggerKey, fired_at: DateTime<Utc>) {
        match key {
            TriggerKey::Job(id) => {
                let job = match self.jobs.get_job(&id).await {
                    Ok(Some(job)) if job.is_schedulable() => job,
                    Ok(_) => {
                        tracing::debug!(job_id = %id, "job missing or paused, ignoring tick");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(job_id = %id, error = %e, "failed to load job for tick");
                        return;
                    }
                };
                tracing::debug!(job_id = %id, %fired_at, "dispatching scheduled job");
                tokio::spawn(async move {
                    if let Err(e) = self.runner.run(&job).await {
                        tracing::error!(job_id = %job.id, error = %e, "scheduled job run failed");
                    }
                });
            }
            TriggerKey::Workflow(id) => {
                let workflow = match self.workflows.get_workflow(&id).await {
                    Ok(Some(workflow)) if workflow.schedule().is_some() => workflow,
                    Ok(_) => {
                        tracing::debug!(workflow_id = %id, "workflow missing or not scheduled, ignoring tick");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(workflow_id = %id, error = %e, "failed to load workflow for tick");
                        return;
                    }
                };
                tracing::debug!(workflow_id = %id, %fired_at, "dispatching scheduled workflow");
                tokio::spawn(async move {
                    let cancel = self.shutdown.child_token();
                    match self.interpreter.run(&workflow, RunTrigger::cron(), &cancel).await {
                        Ok(_) => {}
                        Err(InterpreterError::AlreadyRunning(_)) => {
                            tracing::warn!(workflow_id = %workflow.id, "previous run still in progress, skipping tick");
                        }
                        Err(e) => {
                            tracing::error!(workflow_id = %workflow.id, error = %e, "scheduled workflow run failed");
                        }
                    }
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Definition validation
// ---------------------------------------------------------------------------

fn validate_job(job: &Job) -> Result<(), EngineError> {
    if job.name.trim().is_empty() {
        return Err(EngineError::InvalidDefinition("job name is required".to_string()));
    }
    next_run(&job.cron_expression, Utc::now())
        .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
    Ok(())
}

fn validate_workflow(workflow: &Workflow) -> Result<(), EngineError> {
    if workflow.name.trim().is_empty() {
        return Err(EngineError::InvalidDefinition(
            "workflow name is required".to_string(),
        ));
    }
    let mut orders: Vec<i32> = workflow.steps.iter().map(|s| s.step_order).collect();
    orders.sort_unstable();
    if let Some(pair) = orders.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(EngineError::InvalidDefinition(format!(
            "duplicate stepOrder {}",
            pair[0]
        )));
    }
    if let Some(expr) = workflow.schedule() {
        next_run(expr, Utc::now()).map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
