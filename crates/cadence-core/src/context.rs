//! Execution context threaded through a workflow run.
//!
//! The context is a flat JSON object. Steps extend it under their declared
//! output variable, and the interpreter maintains a few reserved keys:
//!
//! - `_webhookPayload` -- the raw body of a webhook-triggered run
//! - `_lastConditionResult` -- the most recent condition outcome
//! - `_lastResult` -- the most recent action result
//! - `_stepResults` -- action results keyed by step name

use serde_json::{Map, Value};

pub const WEBHOOK_PAYLOAD_KEY: &str = "_webhookPayload";
pub const LAST_CONDITION_KEY: &str = "_lastConditionResult";
pub const LAST_RESULT_KEY: &str = "_lastResult";
pub const STEP_RESULTS_KEY: &str = "_stepResults";

/// Walk a dot-separated path into a JSON value.
///
/// Object segments match keys; array segments must be indices. Returns
/// `None` as soon as a segment cannot be resolved.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable key/value state owned by a single workflow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    /// An empty context, used for manual and cron runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a context from a trigger payload.
    ///
    /// Top-level keys of an object payload are copied in, and the full
    /// payload is kept under `_webhookPayload`.
    pub fn from_payload(payload: Value) -> Self {
        let mut values = match &payload {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        values.insert(WEBHOOK_PAYLOAD_KEY.to_string(), payload);
        Self { values }
    }

    /// Rebuild a context from a persisted snapshot.
    pub fn from_snapshot(snapshot: Value) -> Self {
        match snapshot {
            Value::Object(values) => Self { values },
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Store a condition outcome under `_lastConditionResult` and, when given,
    /// under the step's output variable.
    pub fn record_condition(&mut self, output_variable: Option<&str>, result: bool) {
        if let Some(name) = output_variable {
            self.set(name, Value::Bool(result));
        }
        self.set(LAST_CONDITION_KEY, Value::Bool(result));
    }

    /// Store an action result under `_lastResult`, `_stepResults[step_name]`
    /// and, when given, under the step's output variable.
    pub fn record_result(&mut self, step_name: &str, output_variable: Option<&str>, result: Value) {
        if let Some(name) = output_variable {
            self.set(name, result.clone());
        }
        self.set(LAST_RESULT_KEY, result.clone());

        let step_results = self
            .values
            .entry(STEP_RESULTS_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !step_results.is_object() {
            *step_results = Value::Object(Map::new());
        }
        if let Value::Object(map) = step_results {
            map.insert(step_name.to_string(), result);
        }
    }

    /// Snapshot as a JSON object (for persistence and interpolation).
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let root = json!({ "user": { "name": "Ann", "tags": ["a", "b"] } });
        assert_eq!(lookup(&root, "user.name"), Some(&json!("Ann")));
        assert_eq!(lookup(&root, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&root, "user.email"), None);
        assert_eq!(lookup(&root, "user.name.first"), None);
        assert_eq!(lookup(&root, "user.tags.9"), None);
    }

    #[test]
    fn lookup_returns_null_values() {
        let root = json!({ "a": null });
        assert_eq!(lookup(&root, "a"), Some(&Value::Null));
        assert_eq!(lookup(&root, "a.b"), None);
    }

    #[test]
    fn payload_is_spread_and_kept_whole() {
        let ctx = ExecutionContext::from_payload(json!({ "orderId": 7, "total": 12.5 }));
        assert_eq!(ctx.get("orderId"), Some(&json!(7)));
        assert_eq!(
            ctx.get(WEBHOOK_PAYLOAD_KEY),
            Some(&json!({ "orderId": 7, "total": 12.5 }))
        );
    }

    #[test]
    fn non_object_payload_is_only_kept_whole() {
        let ctx = ExecutionContext::from_payload(json!([1, 2]));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get(WEBHOOK_PAYLOAD_KEY), Some(&json!([1, 2])));
    }

    #[test]
    fn record_result_fills_reserved_keys() {
        let mut ctx = ExecutionContext::new();
        ctx.record_result("Create user", Some("firstId"), json!({ "id": 42 }));
        ctx.record_result("Ping", None, json!("pong"));

        let snapshot = ctx.to_json();
        assert_eq!(snapshot["firstId"], json!({ "id": 42 }));
        assert_eq!(snapshot[LAST_RESULT_KEY], json!("pong"));
        assert_eq!(snapshot[STEP_RESULTS_KEY]["Create user"]["id"], 42);
        assert_eq!(snapshot[STEP_RESULTS_KEY]["Ping"], "pong");
    }

    #[test]
    fn record_condition_sets_last_result_always() {
        let mut ctx = ExecutionContext::new();
        ctx.record_condition(None, false);
        assert_eq!(ctx.get(LAST_CONDITION_KEY), Some(&json!(false)));

        ctx.record_condition(Some("isVip"), true);
        assert_eq!(ctx.get("isVip"), Some(&json!(true)));
        assert_eq!(ctx.get(LAST_CONDITION_KEY), Some(&json!(true)));
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut ctx = ExecutionContext::new();
        ctx.set("a", json!(1));
        let restored = ExecutionContext::from_snapshot(ctx.to_json());
        assert_eq!(restored, ctx);
        assert!(ExecutionContext::from_snapshot(json!("bad")).is_empty());
    }
}
