//! Public webhook receiver.
//!
//! `POST /webhooks/{token}` runs the active workflow that owns `token`. The
//! JSON body seeds the run context; an empty body counts as `{}`.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde_json::json;
use uuid::Uuid;

use super::{RunSummary, json_body};
use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<RunSummary>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();
    let payload = json_body(&body)?.unwrap_or_else(|| json!({}));

    let outcome = state.engine.trigger_webhook(&token, payload).await?;
    tracing::info!(
        run_id = %outcome.execution_id,
        status = %outcome.status,
        "webhook-triggered run finished"
    );

    let href = format!("/api/v1/executions/{}/logs", outcome.execution_id);
    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(RunSummary::from(outcome), request_id, elapsed).with_link("logs", &href),
    ))
}
