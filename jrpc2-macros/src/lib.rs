//! Procedural macros for the jrpc2 JSON-RPC toolkit
//!
//! - `#[handler]` turns an async function into a factory returning
//!   `Box<dyn jrpc2_server::Handler>`.
//! - `#[derive(FromPositional)]` maps a positional params array onto a
//!   struct, field by field in declaration order.
//!
//! Together they let one params struct serve both calling conventions:
//!
//! ```ignore
//! use jrpc2_macros::{handler, FromPositional};
//! use jrpc2_core::Result;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, FromPositional)]
//! struct SubtractParams {
//!     minuend: i64,
//!     subtrahend: i64,
//! }
//!
//! // Accepts {"minuend": 42, "subtrahend": 23} and [42, 23] alike.
//! #[handler]
//! async fn subtract(p: SubtractParams) -> Result<i64> {
//!     Ok(p.minuend - p.subtrahend)
//! }
//!
//! registry.register("subtract", subtract());
//! ```
//!
//! Generated code refers to `::jrpc2_core` and `::jrpc2_server`, so the
//! calling crate needs both as dependencies.

mod handler;
mod positional;

use proc_macro::TokenStream;

/// Turn an async function into a handler factory
///
/// The function keeps its name and visibility, takes no arguments and
/// returns `Box<dyn Handler>`. Accepted signatures:
///
/// ```ignore
/// #[handler] async fn ping() -> Result<String>
/// #[handler] async fn add(p: AddParams) -> Result<i64>
/// #[handler] async fn whoami(ctx: RequestContext, p: ()) -> Result<Value>
/// ```
///
/// With no argument the method accepts absent, `null` or `[]` params. With
/// one, the argument type must implement `Deserialize` and `FromPositional`.
/// With two, the first is the [`RequestContext`] of the call.
///
/// [`RequestContext`]: ../jrpc2_server/struct.RequestContext.html
#[proc_macro_attribute]
pub fn handler(_attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::handler_impl(item)
}

/// Derive `FromPositional` for a struct
///
/// Named structs take fields in declaration order, tuple structs by index.
/// The params array must have exactly one element per field.
#[proc_macro_derive(FromPositional)]
pub fn derive_from_positional(input: TokenStream) -> TokenStream {
    positional::derive_impl(input)
}
