//! Workflow repository trait definition.
//!
//! Defines the storage interface for workflow definitions and their
//! execution records.

use cadence_types::error::RepositoryError;
use cadence_types::execution::{ExecutionStatus, WorkflowExecution};
use cadence_types::workflow::Workflow;
use uuid::Uuid;

/// Repository trait for workflow persistence.
///
/// Covers two entity families:
/// - **Definitions:** CRUD for workflows, including their steps.
/// - **Executions:** one record per run, with a context snapshot.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// All workflows with status `active`.
    fn list_active_workflows(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    /// All workflows regardless of status, ordered by name.
    fn list_workflows(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;

    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Look up the workflow owning a webhook token.
    fn get_workflow_by_webhook_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Upsert a workflow definition (insert or replace by ID).
    fn save_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a workflow by ID. Returns `true` if it existed.
    fn delete_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// The execution of this workflow currently in `running` status, if any.
    fn find_running_execution(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// Insert a new execution record.
    ///
    /// Returns `RepositoryError::Conflict` when another execution of the
    /// same workflow is already `running`.
    fn create_execution(
        &self,
        execution: &WorkflowExecution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist the step just entered and the context snapshot.
    fn update_execution_progress(
        &self,
        id: &Uuid,
        current_step: i32,
        context: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Move an execution to a terminal status, stamping `completed_at`.
    fn finish_execution(
        &self,
        id: &Uuid,
        status: ExecutionStatus,
        context: &serde_json::Value,
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowExecution>, RepositoryError>> + Send;

    /// Executions of a workflow, newest first.
    fn list_executions(
        &self,
        workflow_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowExecution>, RepositoryError>> + Send;
}
