//! Error types for jrpc2
//!
//! Two error types live here:
//!
//! - **Error**: application-level failures raised by handlers, the proxy
//!   client and the server plumbing (uses thiserror)
//! - **ErrorObject**: the wire-format error object placed in the `error`
//!   member of a response
//!
//! # Error Catalogue
//!
//! Every code the server itself emits is listed in [`ErrorCode`]. The message
//! of a catalogue entry is fixed; context goes into `data`.
//!
//! | Code   | Message          |
//! |--------|------------------|
//! | -32700 | Parse error      |
//! | -32600 | Invalid Request  |
//! | -32601 | Method not found |
//! | -32602 | Invalid params   |
//! | -32603 | Internal error   |
//! | -32000 | Method exists    |
//! | -32001 | URL scheme error |
//! | -32002 | Invalid method   |
//! | -32003 | Invalid ID       |
//! | -32004 | Not implemented  |
//!
//! Handlers may return any other code through [`Error::Rpc`]; it is passed
//! to the client untouched.
//!
//! # Examples
//!
//! ```rust
//! use jrpc2_core::{Error, ErrorObject};
//!
//! let wire: ErrorObject = Error::InvalidParams("missing 'minuend'".into()).into();
//! assert_eq!(wire.code, -32602);
//! assert_eq!(wire.message, "Invalid params");
//! assert_eq!(wire.data, Some(serde_json::json!("missing 'minuend'")));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for jrpc2 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type
///
/// Handlers return this from their futures. The dispatcher converts it into an
/// [`ErrorObject`] when a response has to be written, so a handler never
/// needs to know the wire format unless it wants a custom code.
///
/// # Conversion Rules
///
/// - `Rpc` is sent verbatim
/// - `InvalidParams` becomes -32602 with the text as `data`
/// - `Cancelled` becomes -32603 with `data` set to `"request cancelled"`
/// - everything else becomes -32603 with the text as `data`
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A ready-made JSON-RPC error object
    ///
    /// Used for handler-defined application errors and for errors relayed
    /// from a proxied endpoint.
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] ErrorObject),

    /// Parameters did not match what the method expects
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Serialization or deserialization error
    ///
    /// Usually a handler result that could not be turned into JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected failure while running a method
    #[error("Internal error: {0}")]
    Internal(String),

    /// The inbound request was cancelled or hit its deadline
    #[error("Request cancelled")]
    Cancelled,

    /// Input/output error from the listener or a connection
    #[error("IO error: {0}")]
    Io(String),

    /// Outbound HTTP failure while talking to a proxied endpoint
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid server configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// The fixed catalogue of error conditions the server reports
///
/// Every condition has its own code. Invalid ID and Not implemented have
/// historically shared -32001 and -32000 with URL scheme error and Method
/// exists; they were reassigned to -32003 and -32004 so a client can tell
/// the four apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid JSON, wrong `Content-Type`/`Accept`, or an unreadable body
    ParseError,
    /// The JSON is not a valid request object, or the transport was misused
    InvalidRequest,
    /// No method with that name is registered
    MethodNotFound,
    /// Parameters could not be decoded by either calling convention
    InvalidParams,
    /// Proxy failure, cancelled request, unserializable result
    InternalError,
    /// A proxy registration tried to reuse an existing name
    MethodExists,
    /// A proxy URL without an `http://` or `https://` scheme
    UrlSchemeError,
    /// The `method` member is present but is not a string
    InvalidMethod,
    /// The `id` member is not a string, an integer-valued number or null
    InvalidId,
    /// A batch arrived while batch support is switched off
    NotImplemented,
}

impl ErrorCode {
    /// Numeric code sent on the wire
    pub const fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::MethodExists => -32000,
            ErrorCode::UrlSchemeError => -32001,
            ErrorCode::InvalidMethod => -32002,
            ErrorCode::InvalidId => -32003,
            ErrorCode::NotImplemented => -32004,
        }
    }

    /// Fixed message sent on the wire
    pub const fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::MethodExists => "Method exists",
            ErrorCode::UrlSchemeError => "URL scheme error",
            ErrorCode::InvalidMethod => "Invalid method",
            ErrorCode::InvalidId => "Invalid ID",
            ErrorCode::NotImplemented => "Not implemented",
        }
    }

    /// Look up the catalogue entry for a numeric code
    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [ErrorCode; 10] = [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::MethodExists,
            ErrorCode::UrlSchemeError,
            ErrorCode::InvalidMethod,
            ErrorCode::InvalidId,
            ErrorCode::NotImplemented,
        ];
        ALL.into_iter().find(|entry| entry.code() == code)
    }
}

/// JSON-RPC 2.0 error object as it appears on the wire
///
/// `code` and `message` are mandatory, `data` is omitted when absent.
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::ErrorObject;
/// use serde_json::json;
///
/// let error = ErrorObject::method_not_found();
/// assert_eq!(
///     serde_json::to_value(&error).unwrap(),
///     json!({"code": -32601, "message": "Method not found"})
/// );
///
/// // Application-defined error with context
/// let custom = ErrorObject::new(-32099, "Out of range").with_data(json!({"max": 10}));
/// assert_eq!(custom.data, Some(json!({"max": 10})));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric error code
    pub code: i32,

    /// Short description of the error
    pub message: String,

    /// Optional diagnostic context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error with an arbitrary code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured `data` to the error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a human-readable diagnostic string as `data`
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with_data(Value::String(detail.into()))
    }

    /// -32700 Parse error
    pub fn parse_error() -> Self {
        ErrorCode::ParseError.into()
    }

    /// -32600 Invalid Request
    pub fn invalid_request() -> Self {
        ErrorCode::InvalidRequest.into()
    }

    /// -32601 Method not found
    ///
    /// Carries no `data`; the method name is already known to the caller.
    pub fn method_not_found() -> Self {
        ErrorCode::MethodNotFound.into()
    }

    /// -32602 Invalid params
    pub fn invalid_params() -> Self {
        ErrorCode::InvalidParams.into()
    }

    /// -32603 Internal error
    pub fn internal_error() -> Self {
        ErrorCode::InternalError.into()
    }

    /// -32000 Method exists
    pub fn method_exists() -> Self {
        ErrorCode::MethodExists.into()
    }

    /// -32001 URL scheme error
    pub fn url_scheme_error() -> Self {
        ErrorCode::UrlSchemeError.into()
    }

    /// -32002 Invalid method
    pub fn invalid_method() -> Self {
        ErrorCode::InvalidMethod.into()
    }

    /// -32003 Invalid ID
    pub fn invalid_id() -> Self {
        ErrorCode::InvalidId.into()
    }

    /// -32004 Not implemented
    pub fn not_implemented() -> Self {
        ErrorCode::NotImplemented.into()
    }

    /// Catalogue entry this error belongs to, if any
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

impl From<ErrorCode> for ErrorObject {
    fn from(code: ErrorCode) -> Self {
        ErrorObject::new(code.code(), code.message())
    }
}

impl From<Error> for ErrorObject {
    fn from(err: Error) -> Self {
        match err {
            Error::Rpc(object) => object,
            Error::InvalidParams(detail) => ErrorObject::invalid_params().with_detail(detail),
            Error::Cancelled => ErrorObject::internal_error().with_detail("request cancelled"),
            Error::Serialization(detail)
            | Error::Internal(detail)
            | Error::Io(detail)
            | Error::Http(detail)
            | Error::Config(detail) => ErrorObject::internal_error().with_detail(detail),
        }
    }
}

impl std::fmt::Display for ErrorObject {
    /// Formats as "[code] message"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalogue_codes() {
        assert_eq!(ErrorObject::parse_error().code, -32700);
        assert_eq!(ErrorObject::invalid_request().code, -32600);
        assert_eq!(ErrorObject::method_not_found().code, -32601);
        assert_eq!(ErrorObject::invalid_params().code, -32602);
        assert_eq!(ErrorObject::internal_error().code, -32603);
        assert_eq!(ErrorObject::method_exists().code, -32000);
        assert_eq!(ErrorObject::url_scheme_error().code, -32001);
        assert_eq!(ErrorObject::invalid_method().code, -32002);
        assert_eq!(ErrorObject::invalid_id().code, -32003);
        assert_eq!(ErrorObject::not_implemented().code, -32004);
    }

    #[test]
    fn test_catalogue_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in -32700..=-32000 {
            if let Some(entry) = ErrorCode::from_code(code) {
                assert!(seen.insert(entry));
                assert_eq!(entry.code(), code);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_method_not_found_wire_format() {
        let value = serde_json::to_value(ErrorObject::method_not_found()).unwrap();
        assert_eq!(value, json!({"code": -32601, "message": "Method not found"}));
    }

    #[test]
    fn test_detail_is_carried_as_data() {
        let error = ErrorObject::invalid_request().with_detail("method name must be a string");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["message"], "Invalid Request");
        assert_eq!(value["data"], "method name must be a string");
    }

    #[test]
    fn test_error_conversion() {
        let rpc = ErrorObject::new(42, "custom").with_data(json!([1, 2]));
        assert_eq!(ErrorObject::from(Error::Rpc(rpc.clone())), rpc);

        let params: ErrorObject = Error::InvalidParams("bad".into()).into();
        assert_eq!(params.kind(), Some(ErrorCode::InvalidParams));
        assert_eq!(params.data, Some(json!("bad")));

        let cancelled: ErrorObject = Error::Cancelled.into();
        assert_eq!(cancelled.code, -32603);
        assert_eq!(cancelled.data, Some(json!("request cancelled")));

        let http: ErrorObject = Error::Http("connection refused".into()).into();
        assert_eq!(http.message, "Internal error");
        assert_eq!(http.data, Some(json!("connection refused")));
    }

    #[test]
    fn test_serde_error_becomes_serialization() {
        let serde_error = serde_json::from_str::<Value>("{oops").unwrap_err();
        match Error::from(serde_error) {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("Expected Serialization error, got {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        let display = ErrorObject::invalid_id().to_string();
        assert_eq!(display, "[-32003] Invalid ID");
    }

    #[test]
    fn test_deserialize_without_data() {
        let error: ErrorObject =
            serde_json::from_value(json!({"code": -1, "message": "nope"})).unwrap();
        assert_eq!(error.code, -1);
        assert!(error.data.is_none());
    }
}
