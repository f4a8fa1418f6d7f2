//! In-memory fakes for the core ports, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cadence_types::action::{ActionConfig, ScriptLanguage};
use cadence_types::error::RepositoryError;
use cadence_types::execution::{
    ExecutionLog, ExecutionStatus, LogOutcome, WorkflowExecution,
};
use cadence_types::job::{Job, JobStatus};
use cadence_types::workflow::{
    Condition, StepType, TriggerType, Workflow, WorkflowStatus, WorkflowStep,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::action::{ActionError, ActionExecutor};
use crate::job::notifier::{FailureNotifier, JobFailure, NotifyError};
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::job::JobRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::template::interpolate;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn script(code: &str) -> ActionConfig {
    ActionConfig::Script {
        code: code.to_string(),
        language: ScriptLanguage::Rhai,
    }
}

pub fn sample_job(name: &str) -> Job {
    Job {
        id: Uuid::now_v7(),
        name: name.to_string(),
        cron_expression: "*/5 * * * *".to_string(),
        status: JobStatus::Active,
        action: script(name),
        last_run: None,
        next_run: None,
        depends_on: None,
        notify_on_failure: false,
        notify_webhook_url: None,
        version: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn action_step(order: i32, name: &str, action: ActionConfig, output: Option<&str>) -> WorkflowStep {
    WorkflowStep {
        id: Uuid::now_v7(),
        name: name.to_string(),
        step_order: order,
        step_type: StepType::Action,
        action: Some(action),
        condition: None,
        output_variable: output.map(str::to_string),
        on_true_step: None,
        on_false_step: None,
    }
}

pub fn condition_step(
    order: i32,
    name: &str,
    condition: Option<Condition>,
    on_true: Option<i32>,
    on_false: Option<i32>,
) -> WorkflowStep {
    WorkflowStep {
        id: Uuid::now_v7(),
        name: name.to_string(),
        step_order: order,
        step_type: StepType::Condition,
        action: None,
        condition,
        output_variable: None,
        on_true_step: on_true,
        on_false_step: on_false,
    }
}

pub fn sample_workflow(name: &str, steps: Vec<WorkflowStep>) -> Workflow {
    Workflow {
        id: Uuid::now_v7(),
        name: name.to_string(),
        description: None,
        status: WorkflowStatus::Active,
        cron_expression: None,
        trigger_type: TriggerType::Manual,
        webhook_token: None,
        steps,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<Uuid, Job>>,
    fail_run_times: AtomicBool,
}

impl InMemoryJobRepository {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        let repo = Self::default();
        {
            let mut map = repo.jobs.lock().unwrap();
            for job in jobs {
                map.insert(job.id, job);
            }
        }
        repo
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    /// Make every later `update_run_times` call fail.
    pub fn fail_run_time_updates(&self) {
        self.fail_run_times.store(true, Ordering::SeqCst);
    }
}

impl JobRepository for InMemoryJobRepository {
    async fn list_active_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == JobStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn get_job(&self, id: &Uuid) -> Result<Option<Job>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn save_job(&self, job: &Job) -> Result<Job, RepositoryError> {
        let mut map = self.jobs.lock().unwrap();
        let mut saved = job.clone();
        if let Some(existing) = map.get(&job.id) {
            saved.version = existing.version + 1;
            saved.created_at = existing.created_at;
        }
        saved.updated_at = Utc::now();
        map.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete_job(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.jobs.lock().unwrap().remove(id).is_some())
    }

    async fn update_run_times(
        &self,
        id: &Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        if self.fail_run_times.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        let mut map = self.jobs.lock().unwrap();
        let job = map.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.last_run = last_run;
        job.next_run = next_run;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: Mutex<HashMap<Uuid, Workflow>>,
    executions: Mutex<Vec<WorkflowExecution>>,
}

impl InMemoryWorkflowRepository {
    pub fn with_workflows(workflows: Vec<Workflow>) -> Self {
        let repo = Self::default();
        {
            let mut map = repo.workflows.lock().unwrap();
            for wf in workflows {
                map.insert(wf.id, wf);
            }
        }
        repo
    }

    pub fn executions(&self) -> Vec<WorkflowExecution> {
        self.executions.lock().unwrap().clone()
    }

    /// Seed an execution row without going through the conflict check.
    pub fn insert_execution(&self, execution: WorkflowExecution) {
        self.executions.lock().unwrap().push(execution);
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn list_active_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|w| w.status == WorkflowStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let mut workflows: Vec<Workflow> =
            self.workflows.lock().unwrap().values().cloned().collect();
        workflows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(workflows)
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.workflows.lock().unwrap().get(id).cloned())
    }

    async fn get_workflow_by_webhook_token(
        &self,
        token: &str,
    ) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .find(|w| w.webhook_token.as_deref() == Some(token))
            .cloned())
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.workflows.lock().unwrap().remove(id).is_some())
    }

    async fn find_running_execution(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.workflow_id == *workflow_id && e.status == ExecutionStatus::Running)
            .cloned())
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let running = executions.iter().any(|e| {
            e.workflow_id == execution.workflow_id && e.status == ExecutionStatus::Running
        });
        if running {
            return Err(RepositoryError::Conflict(format!(
                "workflow {} already has a running execution",
                execution.workflow_id
            )));
        }
        executions.push(execution.clone());
        Ok(())
    }

    async fn update_execution_progress(
        &self,
        id: &Uuid,
        current_step: i32,
        context: &Value,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let exec = executions
            .iter_mut()
            .find(|e| e.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        exec.current_step = Some(current_step);
        exec.context = context.clone();
        Ok(())
    }

    async fn finish_execution(
        &self,
        id: &Uuid,
        status: ExecutionStatus,
        context: &Value,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut executions = self.executions.lock().unwrap();
        let exec = executions
            .iter_mut()
            .find(|e| e.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        exec.status = status;
        exec.context = context.clone();
        exec.error = error.map(str::to_string);
        exec.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == *id)
            .cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.workflow_id == *workflow_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLogRepository {
    logs: Mutex<Vec<ExecutionLog>>,
}

impl InMemoryLogRepository {
    pub fn all(&self) -> Vec<ExecutionLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn get(&self, id: &Uuid) -> Option<ExecutionLog> {
        self.logs.lock().unwrap().iter().find(|l| l.id == *id).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|l| l.name).collect()
    }
}

impl ExecutionLogRepository for InMemoryLogRepository {
    async fn create_log(&self, log: &ExecutionLog) -> Result<(), RepositoryError> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }

    async fn finish_log(
        &self,
        id: &Uuid,
        outcome: &LogOutcome,
        completed_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), RepositoryError> {
        let mut logs = self.logs.lock().unwrap();
        let log = logs
            .iter_mut()
            .find(|l| l.id == *id)
            .ok_or(RepositoryError::NotFound)?;
        log.status = outcome.status();
        log.completed_at = Some(completed_at);
        log.duration_ms = Some(duration_ms);
        match outcome {
            LogOutcome::Success(output) => log.output = Some(output.clone()),
            LogOutcome::Failure(error) => log.error = Some(error.clone()),
        }
        Ok(())
    }

    async fn list_logs(
        &self,
        job_id: Option<&Uuid>,
        limit: u32,
    ) -> Result<Vec<ExecutionLog>, RepositoryError> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|l| job_id.is_none() || l.job_id.as_ref() == job_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_logs_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<ExecutionLog>, RepositoryError> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.workflow_execution_id.as_ref() == Some(execution_id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Action executor
// ---------------------------------------------------------------------------

/// An executor whose replies are keyed by the action's interpolated target:
/// the URL for HTTP and webhook actions, the code for scripts.
///
/// Unknown keys reply `"ok"`. Every call is recorded.
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, key: &str, output: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(key.to_string(), Ok(output.to_string()));
        self
    }

    pub fn fail(self, key: &str, error: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(key.to_string(), Err(error.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionExecutor for ScriptedExecutor {
    async fn execute(&self, action: &ActionConfig, context: &Value) -> Result<String, ActionError> {
        let key = match action {
            ActionConfig::HttpRequest { url, .. } | ActionConfig::Webhook { url, .. } => {
                interpolate(url, context)
            }
            ActionConfig::Script { code, .. } => interpolate(code, context),
        };
        self.calls.lock().unwrap().push(key.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(&key).cloned();
        match reply {
            Some(Ok(output)) => Ok(output),
            Some(Err(error)) => Err(ActionError::Script(error)),
            None => Ok("ok".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<JobFailure>>,
    fail: bool,
    pub notified: Notify,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<JobFailure> {
        self.sent.lock().unwrap().clone()
    }
}

impl FailureNotifier for RecordingNotifier {
    async fn notify(&self, failure: &JobFailure) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(failure.clone());
        self.notified.notify_one();
        if self.fail {
            return Err(NotifyError::Status(500));
        }
        Ok(())
    }
}
