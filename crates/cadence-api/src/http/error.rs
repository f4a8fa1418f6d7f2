//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use cadence_core::engine::EngineError;
use cadence_core::workflow::InterpreterError;
use cadence_types::error::RepositoryError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Engine(EngineError),
    /// Malformed request input.
    Validation(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Engine(EngineError::UnknownWebhook) => {
                (StatusCode::NOT_FOUND, "WEBHOOK_NOT_FOUND", "Webhook not found".to_string())
            }
            AppError::Engine(e @ EngineError::WorkflowNotFound(_)) => {
                (StatusCode::NOT_FOUND, "WORKFLOW_NOT_FOUND", e.to_string())
            }
            AppError::Engine(e @ EngineError::JobNotFound(_)) => {
                (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", e.to_string())
            }
            AppError::Engine(e @ EngineError::WorkflowInactive(_)) => {
                (StatusCode::CONFLICT, "WORKFLOW_PAUSED", e.to_string())
            }
            AppError::Engine(e @ EngineError::Interpreter(InterpreterError::AlreadyRunning(_))) => {
                (StatusCode::CONFLICT, "ALREADY_RUNNING", e.to_string())
            }
            AppError::Engine(EngineError::InvalidDefinition(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Engine(EngineError::Repository(RepositoryError::NotFound)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found".to_string())
            }
            AppError::Engine(EngineError::Repository(RepositoryError::Conflict(msg))) => {
                (StatusCode::CONFLICT, "CONFLICT", msg.clone())
            }
            AppError::Engine(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR", e.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
