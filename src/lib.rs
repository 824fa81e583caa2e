//! jrpc2 - JSON-RPC 2.0 over HTTP
//!
//! Convenience crate that re-exports the jrpc2 sub-crates:
//!
//! - **jrpc2-core**: protocol types, codec, validation, params, errors, observability
//! - **jrpc2-server**: HTTP server, registry, dispatcher, proxy, middleware
//! - **jrpc2-macros**: `#[handler]` and `#[derive(FromPositional)]`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jrpc2::{handler, FromPositional, Jrpc2Server};
//! use jrpc2::core::Result;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, FromPositional)]
//! struct SubtractParams { minuend: i64, subtrahend: i64 }
//!
//! #[handler]
//! async fn subtract(p: SubtractParams) -> Result<i64> {
//!     Ok(p.minuend - p.subtrahend)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Jrpc2Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("subtract", subtract())
//!         .build()
//!         .await?;
//!
//!     server.run().await
//! }
//! ```
//!
//! The macros expand to paths under `jrpc2_core` and `jrpc2_server`, so a
//! crate using them depends on those two crates directly.

pub use jrpc2_core as core;
pub use jrpc2_macros as macros;
pub use jrpc2_server as server;

pub use jrpc2_core::{Error, ErrorObject, FromPositional, Result};
pub use jrpc2_macros::{handler, FromPositional};
pub use jrpc2_server::{Jrpc2Server, Registry, RequestContext};
