//! Encoding and decoding of JSON-RPC bodies
//!
//! Decoding classifies a request body as a single request or a batch without
//! interpreting the members; validation happens later, per member, so a bad
//! batch member only spoils its own response entry.
//!
//! Encoded responses are compact and contain no newlines. Transports add the
//! trailing newline when writing the body.
//!
//! # Examples
//!
//! ```rust
//! use jrpc2_core::codec::{self, Payload};
//!
//! match codec::decode(br#"[{"jsonrpc":"2.0","method":"a"}]"#).unwrap() {
//!     Payload::Batch(members) => assert_eq!(members.len(), 1),
//!     Payload::Single(_) => unreachable!(),
//! }
//!
//! let err = codec::decode(b"{not json").unwrap_err();
//! assert_eq!(err.code, -32700);
//! ```

use crate::error::{ErrorObject, Result};
use crate::types::JsonRpcResponse;
use serde_json::Value;

/// A decoded request body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// One top-level JSON value (normally an object)
    Single(Value),
    /// A top-level JSON array
    Batch(Vec<Value>),
}

/// Decode a request body
///
/// Malformed JSON and non-UTF-8 input yield a Parse error whose `data` is the
/// decoder's diagnostic.
pub fn decode(bytes: &[u8]) -> std::result::Result<Payload, ErrorObject> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ErrorObject::parse_error().with_detail(e.to_string()))?;

    Ok(match value {
        Value::Array(members) => Payload::Batch(members),
        other => Payload::Single(other),
    })
}

/// Encode one response
pub fn encode_response(response: &JsonRpcResponse) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

/// Encode a batch of responses as a JSON array
pub fn encode_batch(responses: &[JsonRpcResponse]) -> Result<String> {
    Ok(serde_json::to_string(responses)?)
}

/// Decode a single response body, e.g. from a proxied endpoint
pub fn decode_response(bytes: &[u8]) -> Result<JsonRpcResponse> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Id;
    use serde_json::json;

    #[test]
    fn test_decode_single() {
        let payload = decode(br#"{"jsonrpc":"2.0","method":"sum","id":1}"#).unwrap();
        assert_eq!(
            payload,
            Payload::Single(json!({"jsonrpc": "2.0", "method": "sum", "id": 1}))
        );
    }

    #[test]
    fn test_decode_empty_batch() {
        assert_eq!(decode(b"[]").unwrap(), Payload::Batch(vec![]));
    }

    #[test]
    fn test_decode_scalar_is_single() {
        assert_eq!(decode(b"42").unwrap(), Payload::Single(json!(42)));
    }

    #[test]
    fn test_decode_errors() {
        let truncated = decode(br#"{"jsonrpc":"2.0","method":"foobar"#).unwrap_err();
        assert_eq!(truncated.code, -32700);
        assert!(truncated.data.is_some());

        let empty = decode(b"").unwrap_err();
        assert_eq!(empty.message, "Parse error");

        let binary = decode(&[0xff, 0xfe]).unwrap_err();
        assert_eq!(binary.code, -32700);
    }

    #[test]
    fn test_encode_has_no_newlines() {
        let responses = vec![
            JsonRpcResponse::success(json!({"nested": [1, 2]}), Id::from(1)),
            JsonRpcResponse::error(ErrorObject::invalid_request(), Id::Null),
        ];
        let batch = encode_batch(&responses).unwrap();
        assert!(!batch.contains('\n'));
        assert!(batch.starts_with('[') && batch.ends_with(']'));

        let back: Vec<JsonRpcResponse> = serde_json::from_str(&batch).unwrap();
        assert_eq!(back, responses);
    }

    #[test]
    fn test_decode_response() {
        let response =
            decode_response(br#"{"jsonrpc":"2.0","result":19,"id":"abc"}"#).unwrap();
        assert_eq!(response.result, Some(json!(19)));
        assert_eq!(response.id, Id::String("abc".into()));
    }
}
