//! Workflow run and inspection handlers.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use cadence_types::execution::{ExecutionLog, WorkflowExecution};
use serde::Deserialize;
use uuid::Uuid;

use super::{RunSummary, json_body};
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid id: {raw}")))
}

/// POST /api/v1/workflows/{id}/run - Run a workflow now and wait for it.
///
/// A JSON body, if present, seeds the context the same way a webhook payload
/// does.
pub async fn run_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<RunSummary>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let id = parse_id(&id)?;
    let payload = json_body(&body)?;

    let outcome = state.engine.run_workflow(&id, payload).await?;

    let href = format!("/api/v1/executions/{}/logs", outcome.execution_id);
    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(RunSummary::from(outcome), request_id, elapsed).with_link("logs", &href),
    ))
}

/// GET /api/v1/workflows/{id}/executions - Most recent runs first.
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowExecution>>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;
    let executions = state.engine.executions(&id, query.limit).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        executions,
        Uuid::now_v7().to_string(),
        elapsed,
    )))
}

/// GET /api/v1/executions/{id}/logs - Step logs in run order.
pub async fn execution_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ExecutionLog>>>, AppError> {
    let start = Instant::now();
    let id = parse_id(&id)?;
    let logs = state.engine.execution_logs(&id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        logs,
        Uuid::now_v7().to_string(),
        elapsed,
    )))
}
