//! Structural and semantic checks on a decoded request object
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. `jsonrpc` must be the string `"2.0"`
//! 2. `method` must be present and a string
//! 3. `method` must not start with `rpc.` (any case)
//! 4. `id`, when present, must be a string, an integer or null
//!
//! A request that fails validation is answered even when it has no `id`;
//! only a valid request can be a notification.

use crate::error::ErrorObject;
use crate::types::{Id, JsonRpcRequest, RawRequest, JSONRPC_VERSION};
use serde_json::Value;

/// A request that failed validation, with the id its error response echoes
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Error to report
    pub error: ErrorObject,
    /// The request id when it is well-typed, otherwise null
    pub id: Id,
}

/// True for names in the reserved `rpc.` namespace
pub fn is_reserved_name(method: &str) -> bool {
    method
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("rpc."))
}

/// Validate a raw request
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::{validate::validate, Id, RawRequest};
/// use serde_json::json;
///
/// let raw = RawRequest::from_value(json!({"jsonrpc": "2.0", "method": "rpc.x", "id": 4})).unwrap();
/// let rejection = validate(raw).unwrap_err();
/// assert_eq!(rejection.error.code, -32600);
/// assert_eq!(rejection.id, Id::from(4));
/// ```
pub fn validate(raw: RawRequest) -> Result<JsonRpcRequest, Rejection> {
    let id = raw.id.as_ref().map(Id::from_value);
    let reject = |error: ErrorObject| Rejection {
        error,
        id: id.clone().flatten().unwrap_or(Id::Null),
    };

    if raw.jsonrpc.as_ref().and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(reject(
            ErrorObject::invalid_request()
                .with_detail("jsonrpc request member must be exactly '2.0'"),
        ));
    }

    let method = match raw.method {
        Some(Value::String(method)) => method,
        Some(_) => {
            return Err(reject(
                ErrorObject::invalid_method().with_detail("method data type must be string"),
            ))
        }
        None => {
            return Err(reject(
                ErrorObject::invalid_request().with_detail("method name must be a string"),
            ))
        }
    };

    if is_reserved_name(&method) {
        return Err(reject(
            ErrorObject::invalid_request().with_detail("method cannot match the pattern rpc.*"),
        ));
    }

    let id = match id {
        Some(Some(id)) => Some(id),
        Some(None) => {
            return Err(Rejection {
                error: ErrorObject::invalid_id()
                    .with_detail("ID must be one of string, number or undefined"),
                id: Id::Null,
            })
        }
        None => None,
    };

    Ok(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        method,
        params: raw.params,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(value: Value) -> Result<JsonRpcRequest, Rejection> {
        validate(RawRequest::from_value(value).unwrap())
    }

    #[test]
    fn test_valid_request() {
        let request = check(json!({"jsonrpc": "2.0", "method": "sum", "params": [1], "id": "x"}))
            .unwrap();
        assert_eq!(request.method, "sum");
        assert_eq!(request.params, Some(json!([1])));
        assert_eq!(request.id, Some(Id::String("x".into())));
    }

    #[test]
    fn test_notification_has_no_id() {
        let request = check(json!({"jsonrpc": "2.0", "method": "update"})).unwrap();
        assert!(request.is_notification());
    }

    #[test]
    fn test_null_id_is_not_notification() {
        let request = check(json!({"jsonrpc": "2.0", "method": "m", "id": null})).unwrap();
        assert_eq!(request.id, Some(Id::Null));
    }

    #[test]
    fn test_bad_version() {
        for version in [json!("1.0"), json!(2.0), json!(null)] {
            let rejection = check(json!({"jsonrpc": version, "method": "m", "id": 1})).unwrap_err();
            assert_eq!(rejection.error.code, -32600);
            assert_eq!(rejection.id, Id::from(1));
        }
        let missing = check(json!({"method": "m", "id": 1})).unwrap_err();
        assert_eq!(missing.error.code, -32600);
    }

    #[test]
    fn test_version_checked_before_method() {
        let rejection = check(json!({"jsonrpc": "1.0", "method": 1})).unwrap_err();
        assert_eq!(rejection.error.code, -32600);
    }

    #[test]
    fn test_missing_method() {
        let rejection = check(json!({"jsonrpc": "2.0", "id": 2})).unwrap_err();
        assert_eq!(rejection.error.code, -32600);
        assert_eq!(rejection.error.data, Some(json!("method name must be a string")));
    }

    #[test]
    fn test_method_wrong_type() {
        let rejection = check(json!({"jsonrpc": "2.0", "method": 1, "id": 2})).unwrap_err();
        assert_eq!(rejection.error.code, -32002);
        assert_eq!(rejection.id, Id::from(2));
    }

    #[test]
    fn test_reserved_prefix_any_case() {
        for name in ["rpc.discover", "RPC.x", "Rpc.", "rPc.foo"] {
            let rejection = check(json!({"jsonrpc": "2.0", "method": name, "id": 1})).unwrap_err();
            assert_eq!(rejection.error.code, -32600);
        }
        assert!(check(json!({"jsonrpc": "2.0", "method": "rpcx", "id": 1})).is_ok());
        assert!(check(json!({"jsonrpc": "2.0", "method": "jrpc2.register", "id": 1})).is_ok());
    }

    #[test]
    fn test_reserved_name_multibyte() {
        assert!(!is_reserved_name("rp\u{e9}x"));
        assert!(!is_reserved_name("r"));
    }

    #[test]
    fn test_invalid_id_types() {
        for id in [json!(1.5), json!([1]), json!({"a": 1}), json!(true)] {
            let rejection = check(json!({"jsonrpc": "2.0", "method": "m", "id": id})).unwrap_err();
            assert_eq!(rejection.error.code, -32003);
            assert_eq!(rejection.id, Id::Null);
        }
    }

    #[test]
    fn test_integer_valued_float_id() {
        let request = check(json!({"jsonrpc": "2.0", "method": "m", "id": 3.0})).unwrap();
        assert_eq!(serde_json::to_value(request.id).unwrap(), json!(3.0));
    }

    #[test]
    fn test_ids_beyond_i64_are_valid() {
        for text in [
            r#"{"jsonrpc":"2.0","method":"m","id":18446744073709551615}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":1e20}"#,
            r#"{"jsonrpc":"2.0","method":"m","id":-9223372036854775809}"#,
        ] {
            let raw: RawRequest = serde_json::from_str(text).unwrap();
            let sent = raw.id.clone().unwrap();
            let request = validate(raw).unwrap();
            assert_eq!(serde_json::to_value(request.id).unwrap(), sent);
        }
    }
}
