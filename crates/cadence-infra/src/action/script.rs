//! Rhai sandbox for `script` actions.
//!
//! Scripts run on a blocking thread with a fresh engine per run. They see the
//! run context as the constant `context` and log through `console_log`,
//! `console_warn`, `console_error`, `print` and `debug`, all of which write to
//! a capture buffer instead of stdio. The engine registers no filesystem,
//! network or process functions; the operation limit and the wall-clock
//! deadline bound how long a script can hold its thread.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cadence_core::action::ActionError;
use cadence_types::config::ScriptConfig;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;

/// Result text when a script neither returns a value nor logs anything.
pub const NO_OUTPUT: &str = "Script executed successfully";

/// Grace period on top of the script deadline before the async side gives up.
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

type LineBuffer = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    limits: ScriptConfig,
}

impl ScriptSandbox {
    pub fn new(limits: &ScriptConfig) -> Self {
        Self {
            limits: limits.clone(),
        }
    }

    /// Run `code` against `context` and produce the action's result text.
    pub async fn run(&self, code: String, context: &Value) -> Result<String, ActionError> {
        let limits = self.limits.clone();
        let context = context.clone();
        let timeout = Duration::from_secs(limits.timeout_secs);

        let handle = tokio::task::spawn_blocking(move || run_blocking(&limits, &code, &context));

        match tokio::time::timeout(timeout + DEADLINE_GRACE, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ActionError::Script(format!("script task failed: {join_err}"))),
            Err(_) => Err(ActionError::Timeout(self.limits.timeout_secs)),
        }
    }
}

fn run_blocking(limits: &ScriptConfig, code: &str, context: &Value) -> Result<String, ActionError> {
    let lines: LineBuffer = Arc::new(Mutex::new(Vec::new()));
    let deadline = Instant::now() + Duration::from_secs(limits.timeout_secs);
    let engine = build_engine(limits, deadline, &lines);

    let context = rhai::serde::to_dynamic(context)
        .map_err(|e| ActionError::Script(format!("context is not representable in script: {e}")))?;
    let mut scope = Scope::new();
    scope.push_constant("context", context);

    let result = engine
        .eval_with_scope::<Dynamic>(&mut scope, code)
        .map_err(|e| script_error(*e, limits))?;

    if !result.is_unit() {
        let value: Value = rhai::serde::from_dynamic(&result)
            .map_err(|e| ActionError::Script(format!("script result is not serializable: {e}")))?;
        return Ok(value.to_string());
    }

    let lines = take_lines(&lines);
    if lines.is_empty() {
        Ok(NO_OUTPUT.to_string())
    } else {
        Ok(lines.join("\n"))
    }
}

fn build_engine(limits: &ScriptConfig, deadline: Instant, lines: &LineBuffer) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_string_size(limits.max_string_size);

    engine.on_progress(move |_ops| {
        if Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    let buf = Arc::clone(lines);
    engine.on_print(move |text| push_line(&buf, text.to_string()));
    let buf = Arc::clone(lines);
    engine.on_debug(move |text, _source, _pos| push_line(&buf, text.to_string()));

    for (name, prefix) in [
        ("console_log", ""),
        ("console_warn", "[warn] "),
        ("console_error", "[error] "),
    ] {
        let buf = Arc::clone(lines);
        engine.register_fn(name, move |message: Dynamic| {
            push_line(&buf, format!("{prefix}{message}"));
        });
    }

    engine
}

fn push_line(lines: &LineBuffer, line: String) {
    tracing::debug!(target: "cadence::script", "{line}");
    lines
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(line);
}

fn take_lines(lines: &LineBuffer) -> Vec<String> {
    std::mem::take(&mut *lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

fn script_error(err: EvalAltResult, limits: &ScriptConfig) -> ActionError {
    match err {
        EvalAltResult::ErrorTerminated(..) => ActionError::Timeout(limits.timeout_secs),
        EvalAltResult::ErrorTooManyOperations(..) => ActionError::Script(format!(
            "script exceeded the limit of {} operations",
            limits.max_operations
        )),
        other => ActionError::Script(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sandbox() -> ScriptSandbox {
        ScriptSandbox::new(&ScriptConfig::default())
    }

    #[tokio::test]
    async fn returned_value_is_json() {
        let out = sandbox()
            .run(
                r#"#{ total: context.order.qty * 2, name: context.order.name }"#.to_string(),
                &json!({ "order": { "qty": 21, "name": "widget" } }),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, json!({ "total": 42, "name": "widget" }));
    }

    #[tokio::test]
    async fn console_lines_are_result_when_nothing_returned() {
        let out = sandbox()
            .run(
                r#"console_log("start"); console_warn("careful"); console_error(42); print("done");"#
                    .to_string(),
                &json!({}),
            )
            .await
            .unwrap();
        assert_eq!(out, "start\n[warn] careful\n[error] 42\ndone");
    }

    #[tokio::test]
    async fn silent_script_yields_placeholder() {
        let out = sandbox()
            .run("let x = 1;".to_string(), &json!({}))
            .await
            .unwrap();
        assert_eq!(out, NO_OUTPUT);
    }

    #[tokio::test]
    async fn thrown_error_is_script_failure() {
        let err = sandbox()
            .run(r#"throw "boom";"#.to_string(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Script(ref msg) if msg.contains("boom")));
    }

    #[tokio::test]
    async fn context_is_read_only() {
        let err = sandbox()
            .run("context = 1;".to_string(), &json!({ "a": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Script(_)));
    }

    #[tokio::test]
    async fn operation_limit_stops_runaway_loop() {
        let limits = ScriptConfig {
            max_operations: 1_000,
            ..ScriptConfig::default()
        };
        let err = ScriptSandbox::new(&limits)
            .run("loop { }".to_string(), &json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "script exceeded the limit of 1000 operations"
        );
    }

    #[tokio::test]
    async fn deadline_stops_long_script() {
        let limits = ScriptConfig {
            max_operations: 0,
            timeout_secs: 1,
            ..ScriptConfig::default()
        };
        let err = ScriptSandbox::new(&limits)
            .run("loop { }".to_string(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout(1)));
    }
}
