//! Request handlers.

pub mod webhook;
pub mod workflow;

use axum::body::Bytes;
use cadence_core::workflow::RunOutcome;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::http::error::AppError;

/// Summary of a finished run as returned to HTTP callers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps_entered: u32,
    pub context: Value,
}

impl From<RunOutcome> for RunSummary {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            execution_id: outcome.execution_id,
            status: outcome.status.to_string(),
            error: outcome.error,
            steps_entered: outcome.steps_entered,
            context: outcome.context,
        }
    }
}

/// Parse a request body as JSON. An empty body is `None`.
pub(crate) fn json_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::Validation(format!("request body is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_is_none() {
        assert!(json_body(&Bytes::from_static(b"")).unwrap().is_none());
        assert!(json_body(&Bytes::from_static(b" \n")).unwrap().is_none());
    }

    #[test]
    fn json_body_parses_objects() {
        let value = json_body(&Bytes::from_static(br#"{"order":{"id":7}}"#)).unwrap();
        assert_eq!(value, Some(json!({ "order": { "id": 7 } })));
    }

    #[test]
    fn malformed_body_is_validation_error() {
        assert!(matches!(
            json_body(&Bytes::from_static(b"{nope")),
            Err(AppError::Validation(_))
        ));
    }
}
