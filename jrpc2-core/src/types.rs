//! JSON-RPC 2.0 wire types
//!
//! - [`Id`]: request identifier (string, integer-valued number or null)
//! - [`RawRequest`]: a decoded request object whose members have not been
//!   checked yet
//! - [`JsonRpcRequest`]: a request that passed validation, also used for
//!   outbound proxy calls
//! - [`JsonRpcResponse`]: the response object
//!
//! # Notifications
//!
//! A request without an `id` member is a notification and never gets a
//! response. `"id": null` is *not* a notification; it is an ordinary request
//! whose response carries `"id": null`. The types here keep the two cases
//! apart: an absent id is `None`, a null id is `Some(Id::Null)`.

use crate::error::ErrorObject;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC version literal
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier
///
/// Type-preserving: a numeric id is echoed exactly as it was decoded, so
/// `18446744073709551615` and `1e20` come back unchanged.
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::Id;
/// use serde_json::json;
///
/// assert_eq!(Id::from_value(&json!(7)), Some(Id::from(7)));
/// assert_eq!(Id::from_value(&json!(u64::MAX)), Some(Id::Number(u64::MAX.into())));
/// assert!(Id::from_value(&json!(7.0)).is_some());
/// assert_eq!(Id::from_value(&json!("a")), Some(Id::String("a".into())));
/// assert_eq!(Id::from_value(&json!(1.5)), None);
/// assert_eq!(Id::from_value(&json!([1])), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// Integer-valued numeric identifier
    Number(serde_json::Number),
    /// String identifier
    String(String),
    /// Explicit null identifier
    #[default]
    Null,
}

impl Id {
    /// Interpret a raw JSON value as an identifier
    ///
    /// Returns `None` for anything the protocol does not allow as an id:
    /// fractional numbers, booleans, arrays and objects. Any integer-valued
    /// number is accepted, including `u64` values and floats such as `3.0`
    /// or `1e20`.
    pub fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::Null => Some(Id::Null),
            Value::String(s) => Some(Id::String(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Id::Number(n.clone())),
            Value::Number(n) => {
                let f = n.as_f64()?;
                (f.is_finite() && f.fract() == 0.0).then(|| Id::Number(n.clone()))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n.into())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

/// Deserializes a present member as `Some`, even when it is `null`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A request object straight off the wire
///
/// Every member is kept as an untyped JSON value so the validator can tell
/// "absent" from "present with the wrong type". Unknown members are ignored.
/// A `null` `params` member is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRequest {
    /// The `jsonrpc` member
    #[serde(default)]
    pub jsonrpc: Option<Value>,
    /// The `method` member
    #[serde(default)]
    pub method: Option<Value>,
    /// The `params` member
    #[serde(default)]
    pub params: Option<Value>,
    /// The `id` member; `Some(Value::Null)` when the member is an explicit null
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
}

impl RawRequest {
    /// Build a raw request from one decoded JSON value
    ///
    /// Anything other than a JSON object is an Invalid Request.
    pub fn from_value(value: Value) -> Result<Self, ErrorObject> {
        if !value.is_object() {
            return Err(ErrorObject::invalid_request().with_detail("request must be a JSON object"));
        }
        serde_json::from_value(value)
            .map_err(|e| ErrorObject::invalid_request().with_detail(e.to_string()))
    }
}

/// A validated JSON-RPC request
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::{Id, JsonRpcRequest};
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("subtract", Some(json!([42, 23])), Id::from(1));
/// assert_eq!(
///     serde_json::to_value(&request).unwrap(),
///     json!({"jsonrpc": "2.0", "method": "subtract", "params": [42, 23], "id": 1})
/// );
///
/// let note = JsonRpcRequest::notification("update", None);
/// assert!(note.is_notification());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Raw parameter payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request id; `None` marks a notification
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Id>,
}

impl JsonRpcRequest {
    /// Create a request that expects a response
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Create a notification
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    /// True when the request carries no `id` member
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC response object
///
/// Exactly one of `result` and `error` is present. A `null` result is
/// serialized as `"result":null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Error object for failed calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    /// Result of a successful call
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Id echoed from the request, or null
    #[serde(default)]
    pub id: Id,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(result: Value, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error: None,
            result: Some(result),
            id,
        }
    }

    /// Create an error response
    pub fn error(error: ErrorObject, id: Id) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error: Some(error),
            result: None,
            id,
        }
    }

    /// True for a success response
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True for an error response
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_type_preserved() {
        let number = serde_json::to_string(&Id::from(1)).unwrap();
        let string = serde_json::to_string(&Id::String("1".into())).unwrap();
        assert_eq!(number, "1");
        assert_eq!(string, "\"1\"");
        assert_eq!(serde_json::to_string(&Id::Null).unwrap(), "null");
    }

    #[test]
    fn test_id_from_value_rejects_bad_types() {
        assert_eq!(Id::from_value(&json!(true)), None);
        assert_eq!(Id::from_value(&json!({"a": 1})), None);
        assert_eq!(Id::from_value(&json!(0.25)), None);
        assert_eq!(Id::from_value(&json!(-3)), Some(Id::from(-3)));
        assert_eq!(Id::from_value(&json!(null)), Some(Id::Null));
    }

    #[test]
    fn test_id_accepts_integers_beyond_i64() {
        let big = Id::from_value(&json!(u64::MAX)).unwrap();
        assert_eq!(big, Id::Number(u64::MAX.into()));
        assert_eq!(serde_json::to_string(&big).unwrap(), "18446744073709551615");

        let value: Value = serde_json::from_str("1e20").unwrap();
        let float = Id::from_value(&value).unwrap();
        assert_eq!(serde_json::to_value(&float).unwrap(), value);

        let whole: Value = serde_json::from_str("1.5e1").unwrap();
        assert!(Id::from_value(&whole).is_some());
        let fraction: Value = serde_json::from_str("1.25e1").unwrap();
        assert_eq!(Id::from_value(&fraction), None);
    }

    #[test]
    fn test_raw_request_absent_vs_null_id() {
        let absent = RawRequest::from_value(json!({"jsonrpc": "2.0", "method": "m"})).unwrap();
        assert_eq!(absent.id, None);

        let null = RawRequest::from_value(json!({"jsonrpc": "2.0", "method": "m", "id": null}))
            .unwrap();
        assert_eq!(null.id, Some(Value::Null));
    }

    #[test]
    fn test_raw_request_keeps_wrong_types() {
        let raw = RawRequest::from_value(json!({"jsonrpc": 2, "method": 5, "id": [1]})).unwrap();
        assert_eq!(raw.jsonrpc, Some(json!(2)));
        assert_eq!(raw.method, Some(json!(5)));
        assert_eq!(raw.id, Some(json!([1])));
    }

    #[test]
    fn test_raw_request_rejects_non_object() {
        let err = RawRequest::from_value(json!(1)).unwrap_err();
        assert_eq!(err.code, -32600);
    }

    #[test]
    fn test_request_null_id_round_trip() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "m", "id": null})).unwrap();
        assert_eq!(request.id, Some(Id::Null));
        assert!(!request.is_notification());

        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "m"})).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_response_wire_format() {
        let ok = JsonRpcResponse::success(json!(19), Id::from(1));
        assert_eq!(
            serde_json::to_string(&ok).unwrap(),
            r#"{"jsonrpc":"2.0","result":19,"id":1}"#
        );

        let err = JsonRpcResponse::error(ErrorObject::method_not_found(), Id::from("1"));
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":"1"}"#
        );
    }

    #[test]
    fn test_null_result_is_kept() {
        let response = JsonRpcResponse::success(Value::Null, Id::from(2));
        let text = serde_json::to_string(&response).unwrap();
        assert_eq!(text, r#"{"jsonrpc":"2.0","result":null,"id":2}"#);

        let back: JsonRpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(back.result, Some(Value::Null));
        assert!(back.is_success());
    }
}
