//! Handler traits and adapters for JSON-RPC methods
//!
//! A handler receives the request context and the raw parameter payload and
//! resolves to a JSON value or an [`Error`]. Most handlers are built from
//! closures with one of the adapters:
//!
//! 1. **from_fn**: raw `Option<Value>` params
//! 2. **from_fn_with_context**: raw params plus the [`RequestContext`]
//! 3. **from_typed_fn**: typed params resolved by name or position
//! 4. **from_typed_fn_with_context**: typed params plus the context
//! 5. **#[handler] macro**: generates one of the typed adapters (jrpc2-macros)
//!
//! # Examples
//!
//! ```rust
//! use jrpc2_server::{from_fn, from_typed_fn};
//!
//! let echo = from_fn(|params| async move {
//!     Ok(serde_json::json!({"echo": params}))
//! });
//!
//! // Tuples take positional params: [42, 23]
//! let subtract = from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a - b) });
//! ```

use crate::context::RequestContext;
use futures::future::BoxFuture;
use jrpc2_core::{parse_params, Error, FromPositional, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a handler
pub type HandlerResult = BoxFuture<'static, Result<Value>>;

/// A JSON-RPC method implementation
///
/// Errors are turned into error objects by the dispatcher:
/// - `Error::Rpc` is sent as-is, so handlers can choose their own codes
/// - `Error::InvalidParams` becomes -32602
/// - everything else becomes -32603
pub trait Handler: Send + Sync {
    /// Run the method
    fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult;
}

/// Adapts an async closure into a [`Handler`]
pub struct AsyncHandler<F> {
    func: F,
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        Box::pin((self.func)(ctx, params))
    }
}

/// Handler over raw params
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    from_fn_with_context(move |_ctx: RequestContext, params: Option<Value>| func(params))
}

/// Handler over raw params that also sees the request context
pub fn from_fn_with_context<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Box::new(AsyncHandler { func })
}

/// Handler with typed params and result
///
/// Params are resolved with [`parse_params`]: an array goes through
/// [`FromPositional`], anything else through `Deserialize`. A failure is
/// reported as Invalid params without calling `func`.
///
/// ```rust
/// use jrpc2_server::from_typed_fn;
/// use jrpc2_core::params::{self, FromPositional, ParamsError};
/// use serde::Deserialize;
/// use serde_json::Value;
///
/// #[derive(Deserialize)]
/// struct Greet { name: String }
///
/// impl FromPositional for Greet {
///     fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
///         params::expect_len(&values, 1)?;
///         Ok(Greet { name: params::decode_at(&values, 0)? })
///     }
/// }
///
/// let greet = from_typed_fn(|p: Greet| async move { Ok(format!("hello {}", p.name)) });
/// ```
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + FromPositional + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    from_typed_fn_with_context(move |_ctx: RequestContext, params: P| func(params))
}

/// Typed handler that also sees the request context
pub fn from_typed_fn_with_context<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + FromPositional + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn_with_context(move |ctx: RequestContext, params: Option<Value>| {
        let func = Arc::clone(&func);
        async move {
            let params: P = parse_params(params).map_err(Error::Rpc)?;
            let result = func(ctx, params).await?;
            Ok(serde_json::to_value(result)?)
        }
    })
}
