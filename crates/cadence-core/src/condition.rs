//! Condition evaluation for workflow branch steps.
//!
//! A condition compares the value at a dot-path in the execution context
//! against an optional operand. Evaluation is fail-open: a missing condition
//! or an unknown operator evaluates to `true`.

use cadence_types::workflow::{Condition, ConditionOperator};
use serde_json::Value;

use crate::context::lookup;

/// Evaluate a condition against the execution context.
pub fn evaluate(condition: Option<&Condition>, context: &Value) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    let actual = lookup(context, &condition.field);
    let expected = condition.value.as_ref();

    let result = match condition.operator {
        ConditionOperator::Equals => strict_equals(actual, expected),
        ConditionOperator::NotEquals => !strict_equals(actual, expected),
        ConditionOperator::Contains => string_contains(actual, expected).unwrap_or(false),
        ConditionOperator::NotContains => string_contains(actual, expected)
            .map(|found| !found)
            .unwrap_or(true),
        ConditionOperator::GreaterThan => compare_numbers(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => compare_numbers(actual, expected, |a, b| a < b),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::Unknown => true,
    };

    tracing::trace!(
        field = condition.field.as_str(),
        operator = ?condition.operator,
        result,
        "condition evaluated"
    );
    result
}

/// Type-strict equality. Numbers compare by value regardless of integer or
/// float representation. A field holding `null` equals an explicit `null`
/// operand; an absent field only equals an absent operand.
fn strict_equals(actual: Option<&Value>, expected: Option<&Value>) -> bool {
    match (actual, expected) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// `None` unless both sides are strings.
fn string_contains(actual: Option<&Value>, expected: Option<&Value>) -> Option<bool> {
    match (actual?, expected?) {
        (Value::String(haystack), Value::String(needle)) => Some(haystack.contains(needle.as_str())),
        _ => None,
    }
}

fn compare_numbers(
    actual: Option<&Value>,
    expected: Option<&Value>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (actual.and_then(Value::as_f64), expected.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
