//! Action executor trait and error type.
//!
//! Defines the [`ActionExecutor`] port that performs the side effect of an
//! [`ActionConfig`]. The HTTP/webhook/script implementation lives in
//! cadence-infra; tests substitute scripted fakes.

use cadence_types::action::ActionConfig;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while executing an action.
///
/// The `Display` text is what gets recorded in execution logs.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The target answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The OAuth2 token endpoint rejected the client-credentials exchange.
    #[error("OAuth2 token request failed: HTTP {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The script raised an error or exceeded a sandbox limit.
    #[error("{0}")]
    Script(String),

    /// The request could not be sent or its response could not be read.
    #[error("request failed: {0}")]
    Transport(String),

    #[error("action timed out after {0}s")]
    Timeout(u64),

    /// The action definition cannot be executed as given.
    #[error("invalid action config: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// Executes a single action against the current execution context.
///
/// Placeholders in the action's string fields are resolved against `context`
/// at call time. On success, returns the action's result text (response body,
/// status message, or script output).
pub trait ActionExecutor: Send + Sync {
    fn execute(
        &self,
        action: &ActionConfig,
        context: &Value,
    ) -> impl std::future::Future<Output = Result<String, ActionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_carries_status_and_body() {
        let err = ActionError::Http {
            status: 503,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: upstream down");
    }

    #[test]
    fn token_exchange_display_mentions_status() {
        let err = ActionError::TokenExchange {
            status: 401,
            body: r#"{"error":"invalid_client"}"#.to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid_client"));
    }

    #[test]
    fn script_error_display_is_message() {
        let err = ActionError::Script("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(ActionError::Timeout(10).to_string(), "action timed out after 10s");
    }
}
