//! Shared utilities.

use serde_json::Value;

/// Keys whose values never reach a log line.
const SENSITIVE_KEYS: &[&str] = &["password", "passwd", "token", "api_key", "secret"];

/// Replace sensitive values in RPC parameters before logging.
///
/// Walks nested maps and lists; a key matches case-insensitively.
pub fn redact_params(params: &[Value]) -> Vec<Value> {
    params.iter().map(redact_value).collect()
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let lower = key.to_ascii_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower == *s) {
                        (key.clone(), Value::String("***".to_string()))
                    } else {
                        (key.clone(), redact_value(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

/// Render parameters compactly for error messages and logs.
pub fn render_params(params: &[Value]) -> String {
    params
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
