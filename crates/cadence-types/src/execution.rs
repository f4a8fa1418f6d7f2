//! Execution records: one `WorkflowExecution` per workflow run and one
//! `ExecutionLog` per atomic action attempt.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::TriggerType;

/// Status of a workflow run.
///
/// `Running` transitions to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

/// A single run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    /// `stepOrder` of the step most recently entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<i32>,
    /// Snapshot of the run context, refreshed after every step.
    pub context: serde_json::Value,
    pub trigger_type: TriggerType,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// A fresh `running` execution.
    pub fn start(workflow_id: Uuid, trigger_type: TriggerType, context: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            status: ExecutionStatus::Running,
            current_step: None,
            context,
            trigger_type,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Status of an individual action attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Running,
    Success,
    Failure,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::Running => write!(f, "running"),
            LogStatus::Success => write!(f, "success"),
            LogStatus::Failure => write!(f, "failure"),
        }
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(LogStatus::Running),
            "success" => Ok(LogStatus::Success),
            "failure" => Ok(LogStatus::Failure),
            other => Err(format!("invalid log status: '{other}'")),
        }
    }
}

/// Append-only record of one action attempt, whether a standalone job run or
/// a workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_id: Option<Uuid>,
    /// Display name: the job name, or `"<workflow> > <step>"` for steps.
    pub name: String,
    pub status: LogStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionLog {
    /// A `running` log entry for a standalone job run.
    pub fn for_job(job_id: Uuid, name: impl Into<String>) -> Self {
        Self::running(Some(job_id), None, name.into())
    }

    /// A `running` log entry for a workflow step.
    pub fn for_step(execution_id: Uuid, workflow_name: &str, step_name: &str) -> Self {
        Self::running(
            None,
            Some(execution_id),
            format!("{workflow_name} > {step_name}"),
        )
    }

    fn running(job_id: Option<Uuid>, workflow_execution_id: Option<Uuid>, name: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_id,
            workflow_execution_id,
            name,
            status: LogStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            output: None,
            error: None,
        }
    }
}

/// The terminal outcome written to an [`ExecutionLog`].
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    Success(String),
    Failure(String),
}

impl LogOutcome {
    pub fn status(&self) -> LogStatus {
        match self {
            LogOutcome::Success(_) => LogStatus::Success,
            LogOutcome::Failure(_) => LogStatus::Failure,
        }
    }
}
