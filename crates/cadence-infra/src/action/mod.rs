//! Action executor backed by reqwest and the Rhai sandbox.
//!
//! [`ActionDispatcher`] implements `cadence_core::action::ActionExecutor`.
//! Placeholders are resolved against the run context here, immediately
//! before the side effect happens.

pub mod auth;
pub mod http;
pub mod script;

use std::collections::HashMap;

use cadence_core::action::{ActionError, ActionExecutor};
use cadence_core::template::Interpolator;
use cadence_types::action::ActionConfig;
use cadence_types::config::EngineConfig;
use serde_json::Value;

pub use http::{HttpTransport, OutboundRequest};
pub use script::ScriptSandbox;

const EMPTY_PAYLOAD: &str = "{}";

/// Executes http_request, webhook and script actions.
pub struct ActionDispatcher {
    transport: HttpTransport,
    sandbox: ScriptSandbox,
    interpolator: Interpolator,
}

impl ActionDispatcher {
    pub fn new(config: &EngineConfig) -> Result<Self, ActionError> {
        Ok(Self {
            transport: HttpTransport::new(&config.http)?,
            sandbox: ScriptSandbox::new(&config.script),
            interpolator: Interpolator::new(),
        })
    }

    /// The HTTP transport, shared with the failure notifier.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }
}

impl ActionExecutor for ActionDispatcher {
    async fn execute(&self, action: &ActionConfig, context: &Value) -> Result<String, ActionError> {
        let interp = |s: &str| self.interpolator.interpolate(s, context);

        match action {
            ActionConfig::HttpRequest {
                url,
                method,
                headers,
                body,
                auth,
            } => {
                let headers: HashMap<String, String> = headers
                    .iter()
                    .map(|(name, value)| (name.clone(), interp(value.as_str())))
                    .collect();
                self.transport
                    .send(OutboundRequest {
                        method: *method,
                        url: interp(url.as_str()),
                        headers: &headers,
                        body: body.as_deref().map(interp),
                        auth,
                    })
                    .await
            }
            ActionConfig::Webhook { url, payload } => {
                let payload = interp(payload.as_deref().unwrap_or(EMPTY_PAYLOAD));
                self.transport.post_webhook(&interp(url.as_str()), payload).await
            }
            ActionConfig::Script { code, .. } => self.sandbox.run(interp(code.as_str()), context).await,
        }
    }
}
