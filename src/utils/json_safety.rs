//! JSON-safety normalization for values headed into a `WorkflowExecution.output_data`
//! column. Mirrors `crud_executions.py::make_json_serializable`: `serde_json`
//! cannot represent `Infinity`/`NaN`, so any float produced by the numeric
//! pipeline (temporal metrics, clustering scores) must be sanitized to `null`
//! before it is persisted, rather than panicking or silently truncating.

use serde_json::Value;

/// Recursively replaces non-finite floats with `null` and leaves everything
/// else untouched. Safe to call on a value that is already JSON-safe.
pub fn make_json_serializable(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.is_finite() { Value::Number(n) } else { Value::Null }
            } else {
                Value::Number(n)
            }
        },
        Value::Array(items) => {
            Value::Array(items.into_iter().map(make_json_serializable).collect())
        },
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, make_json_serializable(v))).collect(),
        ),
        other => other,
    }
}

/// Same as [`make_json_serializable`] but takes an `f64` directly, for call
/// sites computing a single metric rather than a whole JSON tree.
pub fn safe_f64(value: f64) -> Value {
    if value.is_finite() {
        serde_json::Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    } else {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_non_finite_numbers_with_null() {
        let raw = json!({
            "velocity": f64::INFINITY,
            "cohesion": f64::NAN,
            "nested": [1.0, f64::NEG_INFINITY, "ok"],
        });
        let safe = make_json_serializable(raw);
        assert_eq!(safe["velocity"], Value::Null);
        assert_eq!(safe["cohesion"], Value::Null);
        assert_eq!(safe["nested"][1], Value::Null);
        assert_eq!(safe["nested"][0], json!(1.0));
    }

    #[test]
    fn leaves_finite_values_untouched() {
        let raw = json!({"a": 1, "b": "x", "c": true});
        assert_eq!(make_json_serializable(raw.clone()), raw);
    }
}
