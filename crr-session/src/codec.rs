//! JSON-RPC 1.0 envelope encoding.

use crate::error::RpcFault;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    id: Value,
}

/// Decoded response: either a payload or an application fault.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Success(Value),
    Fault(RpcFault),
}

pub fn encode_request(id: u64, verb: &str, params: &[Value]) -> String {
    let envelope = RequestEnvelope {
        method: verb,
        params,
        id,
    };
    // A Value tree with string keys always serializes.
    serde_json::to_string(&envelope).unwrap_or_default()
}

/// Decode a response body. `Err` carries the reason the body is not a
/// usable envelope.
pub fn decode_response(expected_id: u64, body: &str) -> Result<RpcOutcome, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("not a JSON-RPC envelope: {e}"))?;
    if !value.is_object() {
        return Err(format!("not a JSON-RPC envelope: top-level {}", kind_of(&value)));
    }
    let envelope: ResponseEnvelope =
        serde_json::from_value(value).map_err(|e| format!("not a JSON-RPC envelope: {e}"))?;

    match &envelope.id {
        Value::Null => {}
        id if id_matches(id, expected_id) => {}
        other => return Err(format!("response id {other} does not match request id {expected_id}")),
    }

    if envelope.error.is_null() {
        return Ok(RpcOutcome::Success(envelope.result));
    }
    Ok(RpcOutcome::Fault(fault_from(envelope.error)))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn id_matches(id: &Value, expected: u64) -> bool {
    match id {
        Value::Number(n) => n.as_u64() == Some(expected),
        Value::String(s) => s.parse::<u64>().ok() == Some(expected),
        _ => false,
    }
}

fn fault_from(error: Value) -> RpcFault {
    match error {
        Value::Object(map) => {
            let code = map
                .get("code")
                .and_then(|c| c.as_i64().or_else(|| c.as_str()?.parse().ok()))
                .unwrap_or(0);
            let message = match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(map).to_string(),
            };
            RpcFault { code, message }
        }
        Value::String(message) => RpcFault { code: 0, message },
        other => RpcFault {
            code: 0,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_request_shape() {
        let body = encode_request(7, "TestCase.get", &[json!(12)]);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            value,
            json!({"method": "TestCase.get", "params": [12], "id": 7})
        );
    }

    #[test]
    fn test_decode_success() {
        let outcome = decode_response(3, r#"{"result": {"id": 5}, "error": null, "id": 3}"#).unwrap();
        assert_eq!(outcome, RpcOutcome::Success(json!({"id": 5})));
    }

    #[test]
    fn test_decode_missing_error_is_success() {
        let outcome = decode_response(3, r#"{"result": [1, 2], "id": "3"}"#).unwrap();
        assert_eq!(outcome, RpcOutcome::Success(json!([1, 2])));
    }

    #[test]
    fn test_decode_fault_object() {
        let outcome = decode_response(
            1,
            r#"{"result": null, "error": {"code": 300, "message": "Login failed"}, "id": 1}"#,
        )
        .unwrap();
        assert_eq!(
            outcome,
            RpcOutcome::Fault(RpcFault {
                code: 300,
                message: "Login failed".to_string()
            })
        );
    }

    #[test]
    fn test_decode_fault_string() {
        let outcome = decode_response(1, r#"{"result": null, "error": "boom", "id": 1}"#).unwrap();
        assert_eq!(
            outcome,
            RpcOutcome::Fault(RpcFault {
                code: 0,
                message: "boom".to_string()
            })
        );
    }

    #[test]
    fn test_decode_rejects_html() {
        let err = decode_response(1, "<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.contains("not a JSON-RPC envelope"));
    }

    #[test]
    fn test_decode_rejects_bare_array() {
        let err = decode_response(1, "[1, 2, 3]").unwrap_err();
        assert!(err.contains("top-level array"));
    }

    #[test]
    fn test_decode_rejects_id_mismatch() {
        let err = decode_response(4, r#"{"result": 1, "error": null, "id": 9}"#).unwrap_err();
        assert!(err.contains("does not match"));
    }
}
