//! Middleware around method invocations
//!
//! Middleware runs around every call that resolved to a registered method,
//! local or proxied. Each middleware can:
//! - inspect the [`RequestContext`] and add metadata for the handler
//! - short-circuit the call with its own result
//! - observe the outcome after the handler ran
//!
//! Pre-handlers run in registration order, post-handlers in reverse order.
//!
//! # Examples
//!
//! Putting the caller's identity into the context:
//!
//! ```rust
//! use jrpc2_server::{MiddlewareAction, RequestContext, SyncMiddleware};
//! use jrpc2_core::Result;
//! use serde_json::Value;
//!
//! struct UserFromHeader;
//!
//! impl SyncMiddleware for UserFromHeader {
//!     fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
//!         if let Some(user) = ctx.header("x-user").map(str::to_owned) {
//!             ctx.insert_metadata("user", Value::String(user));
//!         }
//!         Ok(MiddlewareAction::Continue)
//!     }
//!
//!     fn post_handle(&self, _ctx: &mut RequestContext, _result: &Result<Value>) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use crate::context::RequestContext;
use async_trait::async_trait;
use jrpc2_core::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// What to do after a pre-handler ran
#[derive(Debug, Clone)]
pub enum MiddlewareAction {
    /// Continue to the next middleware or the handler
    Continue,
    /// Skip the handler and answer with this value
    ShortCircuit(Value),
}

/// Async middleware
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before the handler; an `Err` becomes the call's error
    async fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction>;

    /// Called after the handler; errors are logged and ignored
    async fn post_handle(&self, ctx: &mut RequestContext, result: &Result<Value>) -> Result<()>;
}

/// Middleware without async work
pub trait SyncMiddleware: Send + Sync {
    /// Called before the handler
    fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction>;

    /// Called after the handler
    fn post_handle(&self, ctx: &mut RequestContext, result: &Result<Value>) -> Result<()>;
}

struct SyncMiddlewareAdapter<T: SyncMiddleware> {
    inner: T,
}

#[async_trait]
impl<T: SyncMiddleware + 'static> Middleware for SyncMiddlewareAdapter<T> {
    async fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
        self.inner.pre_handle(ctx)
    }

    async fn post_handle(&self, ctx: &mut RequestContext, result: &Result<Value>) -> Result<()> {
        self.inner.post_handle(ctx, result)
    }
}

/// Ordered middleware chain
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append async middleware
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Append sync middleware
    pub fn add_sync<T: SyncMiddleware + 'static>(&mut self, middleware: T) {
        self.middlewares
            .push(Arc::new(SyncMiddlewareAdapter { inner: middleware }));
    }

    /// Run the chain around `handler`
    ///
    /// On a short-circuit the handler and the remaining pre-handlers are
    /// skipped, and post-handlers run only for the middleware that already
    /// saw the call.
    pub async fn execute<F, Fut>(&self, mut ctx: RequestContext, handler: F) -> Result<Value>
    where
        F: FnOnce(RequestContext) -> Fut + Send,
        Fut: std::future::Future<Output = Result<Value>> + Send,
    {
        let mut entered = 0;
        let mut outcome = None;

        for middleware in &self.middlewares {
            match middleware.pre_handle(&mut ctx).await {
                Ok(MiddlewareAction::Continue) => entered += 1,
                Ok(MiddlewareAction::ShortCircuit(value)) => {
                    entered += 1;
                    outcome = Some(Ok(value));
                    break;
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    break;
                }
            }
        }

        let result = match outcome {
            Some(result) => result,
            None => handler(ctx.clone()).await,
        };

        for middleware in self.middlewares[..entered].iter().rev() {
            if let Err(e) = middleware.post_handle(&mut ctx, &result).await {
                tracing::warn!(method = %ctx.method, error = %e, "post_handle failed");
            }
        }

        result
    }

    /// Number of middleware in the chain
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// True for an empty chain
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Logs every call and its outcome through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl SyncMiddleware for LoggingMiddleware {
    fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
        tracing::info!(method = %ctx.method, id = ?ctx.id, "Call started");
        Ok(MiddlewareAction::Continue)
    }

    fn post_handle(&self, ctx: &mut RequestContext, result: &Result<Value>) -> Result<()> {
        match result {
            Ok(_) => tracing::info!(method = %ctx.method, id = ?ctx.id, "Call succeeded"),
            Err(e) => tracing::warn!(method = %ctx.method, id = ?ctx.id, error = %e, "Call failed"),
        }
        Ok(())
    }
}

/// Counts calls and failures in process
///
/// Clones share their counters, so a clone kept outside the server can read
/// what the installed copy recorded.
#[derive(Debug, Clone, Default)]
pub struct MetricsMiddleware {
    calls: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

const STARTED_AT: &str = "metrics.started_at_us";

impl MetricsMiddleware {
    /// Create a middleware with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls seen so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Calls that ended in an error
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Middleware for MetricsMiddleware {
    async fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        ctx.insert_metadata(STARTED_AT, Value::from(process_micros()));
        Ok(MiddlewareAction::Continue)
    }

    async fn post_handle(&self, ctx: &mut RequestContext, result: &Result<Value>) -> Result<()> {
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(started) = ctx.get_metadata(STARTED_AT).and_then(Value::as_u64) {
            let elapsed_us = process_micros().saturating_sub(started);
            tracing::debug!(method = %ctx.method, elapsed_us, "Call timed");
        }
        Ok(())
    }
}

/// Microseconds since the first call in this process
fn process_micros() -> u64 {
    static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}
