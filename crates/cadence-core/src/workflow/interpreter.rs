//! Workflow step interpreter: sequential execution with branch jumps.
//!
//! Steps run one at a time in `stepOrder` order. A condition step may move
//! the cursor to another step by its `stepOrder` instead of advancing. Each
//! step is recorded in the ledger before it runs, and the first failing step
//! stops the run.
//!
//! # Execution flow
//!
//! 1. Claim the workflow's in-process run slot, then check storage for a
//!    running execution. Either being taken rejects the run.
//! 2. Insert a `running` `WorkflowExecution` with the seeded context.
//! 3. For each step: persist progress -> open a step log -> evaluate or
//!    execute -> close the log -> advance or jump.
//! 4. Mark the execution `completed` or `failed` with the final context.

use std::sync::Arc;

use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionStatus, LogOutcome, WorkflowExecution};
use cadence_types::workflow::{StepType, TriggerType, Workflow, WorkflowStep};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::action::ActionExecutor;
use crate::condition;
use crate::context::ExecutionContext;
use crate::ledger::ExecutionLedger;
use crate::repository::execution_log::ExecutionLogRepository;
use crate::repository::workflow::WorkflowRepository;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default upper bound on steps entered by one run.
pub const DEFAULT_MAX_STEP_VISITS: u32 = 1000;

// ---------------------------------------------------------------------------
// Error and result types
// ---------------------------------------------------------------------------

/// Errors that prevent a run from starting or from being recorded.
///
/// A failing step is not an error here; it yields a `failed` [`RunOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    #[error("workflow {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("workflow bookkeeping failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// How a run was started and what it starts with.
#[derive(Debug, Clone)]
pub struct RunTrigger {
    pub trigger_type: TriggerType,
    pub payload: Option<Value>,
}

impl RunTrigger {
    pub fn manual() -> Self {
        Self {
            trigger_type: TriggerType::Manual,
            payload: None,
        }
    }

    pub fn cron() -> Self {
        Self {
            trigger_type: TriggerType::Cron,
            payload: None,
        }
    }

    pub fn webhook(payload: Value) -> Self {
        Self {
            trigger_type: TriggerType::Webhook,
            payload: Some(payload),
        }
    }

    /// Empty for manual and cron runs; seeded from the payload otherwise.
    pub fn initial_context(&self) -> ExecutionContext {
        match &self.payload {
            Some(payload) => ExecutionContext::from_payload(payload.clone()),
            None => ExecutionContext::new(),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub context: Value,
    pub error: Option<String>,
    /// Steps entered, counting re-entries.
    pub steps_entered: u32,
}

struct StepOutcome {
    output: String,
    jump: Option<i32>,
}

struct Walk {
    steps_entered: u32,
    failure: Option<String>,
}

/// Releases a workflow's run slot when dropped.
struct RunSlot<'a> {
    running: &'a DashMap<Uuid, ()>,
    workflow_id: Uuid,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.running.remove(&self.workflow_id);
    }
}

// ---------------------------------------------------------------------------
// WorkflowInterpreter
// ---------------------------------------------------------------------------

/// Walks a workflow's steps, threading the execution context between them.
pub struct WorkflowInterpreter<W, L, A> {
    ledger: ExecutionLedger<W, L>,
    actions: Arc<A>,
    max_step_visits: u32,
    /// Workflows with a run in progress in this process.
    running: DashMap<Uuid, ()>,
}

impl<W, L, A> WorkflowInterpreter<W, L, A>
where
    W: WorkflowRepository,
    L: ExecutionLogRepository,
    A: ActionExecutor,
{
    pub fn new(ledger: ExecutionLedger<W, L>, actions: Arc<A>) -> Self {
        Self {
            ledger,
            actions,
            max_step_visits: DEFAULT_MAX_STEP_VISITS,
            running: DashMap::new(),
        }
    }

    pub fn with_max_step_visits(mut self, max_step_visits: u32) -> Self {
        self.max_step_visits = max_step_visits;
        self
    }

    /// Whether this process is currently running the workflow.
    pub fn is_running(&self, workflow_id: &Uuid) -> bool {
        self.running.contains_key(workflow_id)
    }

    fn claim(&self, workflow_id: Uuid) -> Option<RunSlot<'_>> {
        match self.running.entry(workflow_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(RunSlot {
                    running: &self.running,
                    workflow_id,
                })
            }
        }
    }

    /// Run a workflow to completion or first failure.
    pub async fn run(
        &self,
        workflow: &Workflow,
        trigger: RunTrigger,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, InterpreterError> {
        let Some(_slot) = self.claim(workflow.id) else {
            tracing::warn!(workflow_id = %workflow.id, "workflow already running in this process");
            return Err(InterpreterError::AlreadyRunning(workflow.id));
        };

        if let Some(existing) = self
            .ledger
            .workflows()
            .find_running_execution(&workflow.id)
            .await?
        {
            tracing::warn!(
                workflow_id = %workflow.id,
                run_id = %existing.id,
                "workflow already has a running execution"
            );
            return Err(InterpreterError::AlreadyRunning(workflow.id));
        }

        let mut ctx = trigger.initial_context();
        let execution = WorkflowExecution::start(workflow.id, trigger.trigger_type, ctx.to_json());
        match self.ledger.begin_run(&execution).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => {
                return Err(InterpreterError::AlreadyRunning(workflow.id));
            }
            Err(e) => return Err(e.into()),
        }
        let run_id = execution.id;

        tracing::info!(
            run_id = %run_id,
            workflow = workflow.name.as_str(),
            trigger = %trigger.trigger_type,
            steps = workflow.steps.len(),
            "starting workflow run"
        );

        let steps = workflow.ordered_steps();
        let walk = match self.walk(workflow, &steps, run_id, &mut ctx, cancel).await {
            Ok(walk) => walk,
            Err(e) => {
                let snapshot = ctx.to_json();
                if let Err(record_err) = self.ledger.fail_run(run_id, &snapshot, &e.to_string()).await {
                    tracing::error!(run_id = %run_id, error = %record_err, "could not record run failure");
                }
                return Err(e.into());
            }
        };

        let snapshot = ctx.to_json();
        let status = match &walk.failure {
            None => {
                self.ledger.complete_run(run_id, &snapshot).await?;
                tracing::info!(run_id = %run_id, steps = walk.steps_entered, "workflow run completed");
                ExecutionStatus::Completed
            }
            Some(error) => {
                self.ledger.fail_run(run_id, &snapshot, error).await?;
                tracing::warn!(run_id = %run_id, error = error.as_str(), "workflow run failed");
                ExecutionStatus::Failed
            }
        };

        Ok(RunOutcome {
            execution_id: run_id,
            status,
            context: snapshot,
            error: walk.failure,
            steps_entered: walk.steps_entered,
        })
    }

    async fn walk(
        &self,
        workflow: &Workflow,
        steps: &[WorkflowStep],
        run_id: Uuid,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Walk, RepositoryError> {
        let mut cursor = 0usize;
        let mut steps_entered = 0u32;

        while let Some(step) = steps.get(cursor) {
            if cancel.is_cancelled() {
                return Ok(Walk {
                    steps_entered,
                    failure: Some("cancelled".to_string()),
                });
            }
            if steps_entered >= self.max_step_visits {
                return Ok(Walk {
                    steps_entered,
                    failure: Some(format!(
                        "step visit budget exhausted after {steps_entered} steps"
                    )),
                });
            }
            steps_entered += 1;

            self.ledger
                .record_progress(run_id, step.step_order, &ctx.to_json())
                .await?;
            let log = self
                .ledger
                .open_step_log(run_id, &workflow.name, &step.name)
                .await?;

            tracing::debug!(
                run_id = %run_id,
                step_order = step.step_order,
                step = step.name.as_str(),
                "entering step"
            );

            match self.execute_step(step, ctx).await {
                Ok(outcome) => {
                    self.ledger
                        .close_log(log, &LogOutcome::Success(outcome.output))
                        .await?;
                    cursor = match outcome.jump {
                        Some(target) => match steps.iter().position(|s| s.step_order == target) {
                            Some(index) => index,
                            None => {
                                tracing::debug!(run_id = %run_id, target, "jump target not found, continuing");
                                cursor + 1
                            }
                        },
                        None => cursor + 1,
                    };
                }
                Err(error) => {
                    self.ledger
                        .close_log(log, &LogOutcome::Failure(error.clone()))
                        .await?;
                    return Ok(Walk {
                        steps_entered,
                        failure: Some(error),
                    });
                }
            }
        }

        Ok(Walk {
            steps_entered,
            failure: None,
        })
    }

    async fn execute_step(
        &self,
        step: &WorkflowStep,
        ctx: &mut ExecutionContext,
    ) -> Result<StepOutcome, String> {
        match step.step_type {
            StepType::Condition => {
                let result = condition::evaluate(step.condition.as_ref(), &ctx.to_json());
                ctx.record_condition(step.output_variable.as_deref(), result);
                let jump = if result {
                    step.on_true_step
                } else {
                    step.on_false_step
                };
                Ok(StepOutcome {
                    output: result.to_string(),
                    jump,
                })
            }
            StepType::Action => {
                let action = step
                    .action
                    .as_ref()
                    .ok_or_else(|| format!("step '{}' has no action configured", step.name))?;
                let raw = self
                    .actions
                    .execute(action, &ctx.to_json())
                    .await
                    .map_err(|e| e.to_string())?;
                let parsed = serde_json::from_str::<Value>(&raw)
                    .unwrap_or_else(|_| Value::String(raw.clone()));
                ctx.record_result(&step.name, step.output_variable.as_deref(), parsed);
                Ok(StepOutcome {
                    output: raw,
                    jump: None,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
