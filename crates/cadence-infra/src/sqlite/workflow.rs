//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `cadence-core` using sqlx with split
//! read/write pools. Workflow definitions (including their steps) are stored
//! as JSON blobs, with the columns the engine looks up by (status, trigger,
//! webhook token) mirrored alongside. Executions track the run state and the
//! context snapshot after each step.

use cadence_core::repository::workflow::WorkflowRepository;
use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionStatus, WorkflowExecution};
use cadence_types::workflow::{TriggerType, Workflow};
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_enum, parse_uuid, query_error};

const EXECUTION_COLUMNS: &str = "id, workflow_id, status, current_step, context, trigger_type, \
     started_at, completed_at, error";

/// SQLite-backed implementation of `WorkflowRepository`.
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn definitions(&self, sql: &str, bind: Option<&str>) -> Result<Vec<Workflow>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                WorkflowDefRow::from_row(row)
                    .map_err(query_error)?
                    .into_workflow()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct WorkflowDefRow {
    definition: String,
    created_at: String,
}

impl WorkflowDefRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            definition: row.try_get("definition")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_workflow(self) -> Result<Workflow, RepositoryError> {
        let mut workflow: Workflow = serde_json::from_str(&self.definition)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow definition JSON: {e}")))?;
        workflow.created_at = parse_datetime(&self.created_at)?;
        Ok(workflow)
    }
}

struct ExecutionRow {
    id: String,
    workflow_id: String,
    status: String,
    current_step: Option<i32>,
    context: String,
    trigger_type: String,
    started_at: String,
    completed_at: Option<String>,
    error: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            status: row.try_get("status")?,
            current_step: row.try_get("current_step")?,
            context: row.try_get("context")?,
            trigger_type: row.try_get("trigger_type")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error: row.try_get("error")?,
        })
    }

    fn into_execution(self) -> Result<WorkflowExecution, RepositoryError> {
        let context: serde_json::Value = serde_json::from_str(&self.context)
            .map_err(|e| RepositoryError::Query(format!("invalid context JSON: {e}")))?;

        Ok(WorkflowExecution {
            id: parse_uuid(&self.id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            status: parse_enum::<ExecutionStatus>(&self.status)?,
            current_step: self.current_step,
            context,
            trigger_type: parse_enum::<TriggerType>(&self.trigger_type)?,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            error: self.error,
        })
    }
}

fn context_json(context: &serde_json::Value) -> Result<String, RepositoryError> {
    serde_json::to_string(context).map_err(|e| RepositoryError::Query(e.to_string()))
}

fn parse_execution_row(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowExecution, RepositoryError> {
    ExecutionRow::from_row(row)
        .map_err(query_error)?
        .into_execution()
}

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn list_active_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        self.definitions(
            "SELECT definition, created_at FROM workflows WHERE status = 'active' ORDER BY name ASC",
            None,
        )
        .await
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, RepositoryError> {
        self.definitions(
            "SELECT definition, created_at FROM workflows ORDER BY name ASC",
            None,
        )
        .await
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        let mut found = self
            .definitions(
                "SELECT definition, created_at FROM workflows WHERE id = ?",
                Some(&id.to_string()),
            )
            .await?;
        Ok(found.pop())
    }

    async fn get_workflow_by_webhook_token(
        &self,
        token: &str,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let mut found = self
            .definitions(
                "SELECT definition, created_at FROM workflows WHERE webhook_token = ?",
                Some(token),
            )
            .await?;
        Ok(found.pop())
    }

    async fn save_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut stored = workflow.clone();
        stored.updated_at = Utc::now();
        let definition_json = serde_json::to_string(&stored)
            .map_err(|e| RepositoryError::Query(format!("serialize definition: {e}")))?;
        let token = workflow
            .webhook_token
            .as_deref()
            .filter(|t| !t.trim().is_empty());

        sqlx::query(
            r#"INSERT INTO workflows
               (id, name, status, trigger_type, cron_expression, webhook_token, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 status = excluded.status,
                 trigger_type = excluded.trigger_type,
                 cron_expression = excluded.cron_expression,
                 webhook_token = excluded.webhook_token,
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(workflow.status.to_string())
        .bind(workflow.trigger_type.to_string())
        .bind(&workflow.cron_expression)
        .bind(token)
        .bind(&definition_json)
        .bind(format_datetime(&workflow.created_at))
        .bind(format_datetime(&stored.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict("webhook token already in use".to_string())
            }
            other => query_error(other),
        })?;

        Ok(())
    }

    async fn delete_workflow(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_running_execution(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions \
             WHERE workflow_id = ? AND status = 'running' LIMIT 1"
        ))
        .bind(workflow_id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(query_error)?;

        row.as_ref().map(parse_execution_row).transpose()
    }

    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_executions
               (id, workflow_id, status, current_step, context, trigger_type, started_at, completed_at, error)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(execution.workflow_id.to_string())
        .bind(execution.status.to_string())
        .bind(execution.current_step)
        .bind(context_json(&execution.context)?)
        .bind(execution.trigger_type.to_string())
        .bind(format_datetime(&execution.started_at))
        .bind(execution.completed_at.as_ref().map(format_datetime))
        .bind(&execution.error)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("workflow {} already has a running execution", execution.workflow_id),
            ),
            other => query_error(other),
        })?;

        Ok(())
    }

    async fn update_execution_progress(
        &self,
        id: &Uuid,
        current_step: i32,
        context: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflow_executions SET current_step = ?, context = ? WHERE id = ? AND status = 'running'",
        )
        .bind(current_step)
        .bind(context_json(context)?)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn finish_execution(
        &self,
        id: &Uuid,
        status: ExecutionStatus,
        context: &serde_json::Value,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflow_executions SET status = ?, context = ?, error = ?, completed_at = ? WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(context_json(context)?)
        .bind(error)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<WorkflowExecution>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.as_ref().map(parse_execution_row).transpose()
    }

    async fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<WorkflowExecution>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions \
             WHERE workflow_id = ? ORDER BY started_at DESC, id DESC LIMIT ?"
        ))
        .bind(workflow_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter().map(parse_execution_row).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_support::test_pool;
    use cadence_types::action::{ActionConfig, ScriptLanguage};
    use cadence_types::workflow::{
        Condition, ConditionOperator, StepType, WorkflowStatus, WorkflowStep,
    };
    use serde_json::json;

    fn sample_workflow(name: &str) -> Workflow {
        Workflow {
            id: Uuid::now_v7(),
            name: name.to_string(),
            description: Some("Onboard a new customer".to_string()),
            status: WorkflowStatus::Active,
            cron_expression: None,
            trigger_type: TriggerType::Webhook,
            webhook_token: Some(format!("tok-{name}")),
            steps: vec![
                WorkflowStep {
                    id: Uuid::now_v7(),
                    name: "lookup".to_string(),
                    step_order: 1,
                    step_type: StepType::Action,
                    action: Some(ActionConfig::Script {
                        code: "40 + 2".to_string(),
                        language: ScriptLanguage::Rhai,
                    }),
                    condition: None,
                    output_variable: Some("answer".to_string()),
                    on_true_step: None,
                    on_false_step: None,
                },
                WorkflowStep {
                    id: Uuid::now_v7(),
                    name: "check".to_string(),
                    step_order: 2,
                    step_type: StepType::Condition,
                    action: None,
                    condition: Some(Condition {
                        field: "answer".to_string(),
                        operator: ConditionOperator::GreaterThan,
                        value: Some(json!(10)),
                    }),
                    output_variable: None,
                    on_true_step: Some(1),
                    on_false_step: None,
                },
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn repo_with(workflow: &Workflow) -> SqliteWorkflowRepository {
        let repo = SqliteWorkflowRepository::new(test_pool().await);
        repo.save_workflow(workflow).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_save_and_get_workflow() {
        let wf = sample_workflow("onboarding");
        let repo = repo_with(&wf).await;

        let loaded = repo.get_workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "onboarding");
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.steps[1].on_true_step, Some(1));
        assert_eq!(
            loaded.steps[1].condition.as_ref().unwrap().operator,
            ConditionOperator::GreaterThan
        );
        assert!(repo.get_workflow(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_webhook_token() {
        let wf = sample_workflow("hooked");
        let repo = repo_with(&wf).await;

        let found = repo
            .get_workflow_by_webhook_token("tok-hooked")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, wf.id);
        assert!(
            repo.get_workflow_by_webhook_token("nope")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_webhook_token_conflicts() {
        let wf = sample_workflow("first");
        let repo = repo_with(&wf).await;

        let mut other = sample_workflow("second");
        other.webhook_token = wf.webhook_token.clone();
        let err = repo.save_workflow(&other).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at_and_filters_active() {
        let wf = sample_workflow("toggle");
        let repo = repo_with(&wf).await;

        let mut paused = wf.clone();
        paused.status = WorkflowStatus::Paused;
        paused.created_at = Utc::now() + chrono::Duration::days(1);
        repo.save_workflow(&paused).await.unwrap();

        let loaded = repo.get_workflow(&wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Paused);
        assert_eq!(
            format_datetime(&loaded.created_at),
            format_datetime(&wf.created_at)
        );
        assert!(repo.list_active_workflows().await.unwrap().is_empty());
        assert_eq!(repo.list_workflows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execution_lifecycle() {
        let wf = sample_workflow("runner");
        let repo = repo_with(&wf).await;

        let exec = WorkflowExecution::start(wf.id, TriggerType::Webhook, json!({ "orderId": 7 }));
        repo.create_execution(&exec).await.unwrap();

        let running = repo.find_running_execution(&wf.id).await.unwrap().unwrap();
        assert_eq!(running.id, exec.id);
        assert_eq!(running.context["orderId"], 7);

        repo.update_execution_progress(&exec.id, 2, &json!({ "orderId": 7, "answer": 42 }))
            .await
            .unwrap();
        repo.finish_execution(&exec.id, ExecutionStatus::Completed, &json!({ "answer": 42 }), None)
            .await
            .unwrap();

        let done = repo.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.current_step, Some(2));
        assert_eq!(done.context, json!({ "answer": 42 }));
        assert_eq!(done.trigger_type, TriggerType::Webhook);
        assert!(done.completed_at.is_some());
        assert!(repo.find_running_execution(&wf.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_running_execution_conflicts() {
        let wf = sample_workflow("exclusive");
        let repo = repo_with(&wf).await;

        let first = WorkflowExecution::start(wf.id, TriggerType::Cron, json!({}));
        repo.create_execution(&first).await.unwrap();

        let second = WorkflowExecution::start(wf.id, TriggerType::Manual, json!({}));
        let err = repo.create_execution(&second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.list_executions(&wf.id, 10).await.unwrap().len(), 1);

        // Once the first run finishes a new one may start.
        repo.finish_execution(&first.id, ExecutionStatus::Failed, &json!({}), Some("boom"))
            .await
            .unwrap();
        repo.create_execution(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_executions_newest_first() {
        let wf = sample_workflow("history");
        let repo = repo_with(&wf).await;

        let mut ids = Vec::new();
        for _ in 0..3 {
            let exec = WorkflowExecution::start(wf.id, TriggerType::Manual, json!({}));
            repo.create_execution(&exec).await.unwrap();
            repo.finish_execution(&exec.id, ExecutionStatus::Completed, &json!({}), None)
                .await
                .unwrap();
            ids.push(exec.id);
        }

        let listed: Vec<Uuid> = repo
            .list_executions(&wf.id, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_delete_workflow_cascades_executions() {
        let wf = sample_workflow("doomed");
        let repo = repo_with(&wf).await;
        let exec = WorkflowExecution::start(wf.id, TriggerType::Manual, json!({}));
        repo.create_execution(&exec).await.unwrap();

        assert!(repo.delete_workflow(&wf.id).await.unwrap());
        assert!(repo.get_execution(&exec.id).await.unwrap().is_none());
        assert!(!repo.delete_workflow(&wf.id).await.unwrap());
    }
}
