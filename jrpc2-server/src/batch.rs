//! Batch processing
//!
//! A batch is a JSON array of request objects. Each member is validated and
//! dispatched on its own; the batch response holds one entry per member that
//! expects a response.
//!
//! # Batch Modes
//!
//! - **Parallel**: every member runs as its own tokio task. Entries come
//!   back in completion order, not submission order.
//! - **Sequential**: members run one after another, entries in request order
//! - **Disabled**: any batch is answered with a single Not implemented error
//!
//! # Size Limiting
//!
//! An optional maximum keeps one HTTP request from fanning out into an
//! unbounded number of tasks. Oversized batches get a single Invalid Request
//! error.
//!
//! ```rust
//! use jrpc2_server::{BatchMode, BatchProcessor};
//!
//! let processor = BatchProcessor::with_limit(BatchMode::Parallel, Some(100));
//! assert!(processor.check(101).is_err());
//! assert!(processor.check(0).is_err());
//! assert!(processor.check(3).is_ok());
//! ```

use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use jrpc2_core::{ErrorObject, Id, JsonRpcResponse};
use serde_json::Value;
use tokio::task::JoinSet;

/// How batch members are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Run members concurrently (default)
    #[default]
    Parallel,
    /// Run members in order
    Sequential,
    /// Reject batches
    Disabled,
}

impl BatchMode {
    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
            BatchMode::Disabled => "disabled",
        }
    }
}

/// Batch execution policy
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchProcessor {
    mode: BatchMode,
    max_size: Option<usize>,
}

impl BatchProcessor {
    /// Processor without a size limit
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            max_size: None,
        }
    }

    /// Processor with an optional size limit
    pub fn with_limit(mode: BatchMode, max_size: Option<usize>) -> Self {
        Self { mode, max_size }
    }

    /// Execution mode
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Size limit, if any
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    /// Decide whether a batch of `len` members is processed at all
    ///
    /// The error, if any, is answered as one top-level response with a null
    /// id instead of an array.
    pub fn check(&self, len: usize) -> Result<(), ErrorObject> {
        if self.mode == BatchMode::Disabled {
            return Err(ErrorObject::not_implemented().with_detail("batch requests not supported"));
        }
        if len == 0 {
            return Err(ErrorObject::invalid_request()
                .with_detail("batch must contain at least one request"));
        }
        if let Some(max_size) = self.max_size {
            if len > max_size {
                tracing::warn!(batch_size = len, max_size, "Batch size exceeded");
                return Err(ErrorObject::invalid_request().with_detail(format!(
                    "batch size limit exceeded: limit={}, actual={}",
                    max_size, len
                )));
            }
        }
        Ok(())
    }

    /// Run every member and collect the responses
    ///
    /// Notifications contribute no entry. Returns once every member has
    /// finished.
    #[tracing::instrument(skip_all, fields(batch_size = members.len(), mode = self.mode.as_str()))]
    pub async fn process(
        &self,
        members: Vec<Value>,
        dispatcher: &Dispatcher,
        ctx: &RequestContext,
    ) -> Vec<JsonRpcResponse> {
        let responses = match self.mode {
            BatchMode::Sequential => process_sequential(members, dispatcher, ctx).await,
            BatchMode::Parallel | BatchMode::Disabled => {
                process_parallel(members, dispatcher, ctx).await
            }
        };
        tracing::debug!(response_count = responses.len(), "Batch completed");
        responses
    }
}

async fn process_parallel(
    members: Vec<Value>,
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
) -> Vec<JsonRpcResponse> {
    // Dropping the set aborts members still running, which is what happens
    // when the HTTP request that owns this future goes away.
    let mut tasks = JoinSet::new();
    for member in members {
        let dispatcher = dispatcher.clone();
        let ctx = ctx.clone();
        tasks.spawn(async move { dispatcher.dispatch_value(member, &ctx).await });
    }

    let mut responses = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(response)) => responses.push(response),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "Batch member task failed");
                responses.push(JsonRpcResponse::error(
                    ErrorObject::internal_error().with_detail(e.to_string()),
                    Id::Null,
                ));
            }
        }
    }
    responses
}

async fn process_sequential(
    members: Vec<Value>,
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
) -> Vec<JsonRpcResponse> {
    let mut responses = Vec::new();
    for member in members {
        if let Some(response) = dispatcher.dispatch_value(member, ctx).await {
            responses.push(response);
        }
    }
    responses
}
