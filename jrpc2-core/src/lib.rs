//! Core JSON-RPC 2.0 types and protocol rules for jrpc2
//!
//! This crate is transport-agnostic. It provides:
//!
//! - **Types**: request, response and id types that keep "absent" and
//!   "null" apart
//! - **Error catalogue**: the fixed set of error codes and messages, plus the
//!   application `Error` type
//! - **Codec**: body decoding into single/batch payloads and response encoding
//! - **Validation**: the ordered checks a request must pass before dispatch
//! - **Params**: named and positional parameter resolution
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! `jrpc2-server` builds the HTTP server on top of these pieces.
//!
//! # Example
//!
//! ```rust
//! use jrpc2_core::{codec, validate::validate, Id, RawRequest};
//! use jrpc2_core::codec::Payload;
//!
//! let body = br#"{"jsonrpc":"2.0","method":"subtract","params":[42,23],"id":1}"#;
//! let Payload::Single(value) = codec::decode(body).unwrap() else { unreachable!() };
//! let request = validate(RawRequest::from_value(value).unwrap()).unwrap();
//! assert_eq!(request.method, "subtract");
//! assert_eq!(request.id, Some(Id::from(1)));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod params;
pub mod types;
pub mod validate;

pub use error::{Error, ErrorCode, ErrorObject, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use params::{parse_params, FromPositional, ParamsError};
pub use serde_json::Value;
pub use types::{Id, JsonRpcRequest, JsonRpcResponse, RawRequest, JSONRPC_VERSION};
pub use validate::Rejection;
