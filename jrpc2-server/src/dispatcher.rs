//! The protocol engine: single and batch dispatch
//!
//! [`Dispatcher::dispatch`] takes a raw request body and produces a
//! [`Reply`]. It never fails: every problem with a request that expects a
//! response becomes an error object in that response.
//!
//! Per request the flow is
//! `decode → validate → lookup → middleware → handler or proxy → response`,
//! with notifications dropping their response at the end, whatever the
//! outcome.

use crate::batch::BatchProcessor;
use crate::context::RequestContext;
use crate::metrics::ServerMetrics;
use crate::middleware::MiddlewareChain;
use crate::proxy::ProxyClient;
use crate::registry::{MethodEntry, Registry};
use jrpc2_core::codec::{self, Payload};
use jrpc2_core::validate::{validate, Rejection};
use jrpc2_core::{Error, ErrorObject, Id, JsonRpcRequest, JsonRpcResponse, RawRequest, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of dispatching one HTTP body
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// One response object
    Single(JsonRpcResponse),
    /// A batch response array
    Batch(Vec<JsonRpcResponse>),
    /// Nothing to send: a notification, or a batch of notifications
    Empty,
}

impl Reply {
    /// True when no body should be written
    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    /// Encode the body, newline-terminated; `None` for [`Reply::Empty`]
    pub fn encode(&self) -> Result<Option<String>> {
        let mut body = match self {
            Reply::Single(response) => codec::encode_response(response)?,
            Reply::Batch(responses) => codec::encode_batch(responses)?,
            Reply::Empty => return Ok(None),
        };
        body.push('\n');
        Ok(Some(body))
    }
}

/// Dispatches requests against one registry
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    middleware: Arc<MiddlewareChain>,
    proxy: ProxyClient,
    batch: BatchProcessor,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Dispatcher {
    /// Dispatcher with no middleware and default batch handling
    pub fn new(registry: Registry, proxy: ProxyClient) -> Self {
        Self {
            registry,
            middleware: Arc::new(MiddlewareChain::new()),
            proxy,
            batch: BatchProcessor::default(),
            metrics: None,
        }
    }

    /// Set the middleware chain
    pub fn with_middleware(mut self, chain: MiddlewareChain) -> Self {
        self.middleware = Arc::new(chain);
        self
    }

    /// Set the batch policy
    pub fn with_batch(mut self, batch: BatchProcessor) -> Self {
        self.batch = batch;
        self
    }

    /// Record metrics for every call
    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The registry calls are resolved against
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Metrics instruments, when enabled
    pub fn metrics(&self) -> Option<&ServerMetrics> {
        self.metrics.as_deref()
    }

    /// Dispatch a raw request body
    #[tracing::instrument(skip_all, fields(body_len = body.len()))]
    pub async fn dispatch(&self, body: &[u8], ctx: RequestContext) -> Reply {
        let payload = match codec::decode(body) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(error = %error, "Undecodable body");
                self.record_error(error.code);
                return Reply::Single(JsonRpcResponse::error(error, Id::Null));
            }
        };

        match payload {
            Payload::Single(value) => match self.dispatch_value(value, &ctx).await {
                Some(response) => Reply::Single(response),
                None => Reply::Empty,
            },
            Payload::Batch(members) => {
                if let Err(error) = self.batch.check(members.len()) {
                    self.record_error(error.code);
                    return Reply::Single(JsonRpcResponse::error(error, Id::Null));
                }
                if let Some(metrics) = &self.metrics {
                    metrics.record_batch(members.len() as u64, self.batch.mode().as_str());
                }
                let responses = self.batch.process(members, self, &ctx).await;
                if responses.is_empty() {
                    Reply::Empty
                } else {
                    Reply::Batch(responses)
                }
            }
        }
    }

    /// Dispatch one decoded request object
    ///
    /// Returns `None` for a valid notification. An invalid request always
    /// gets a response, with a null id unless its id was well-typed.
    pub async fn dispatch_value(
        &self,
        value: Value,
        ctx: &RequestContext,
    ) -> Option<JsonRpcResponse> {
        let validated = RawRequest::from_value(value)
            .map_err(|error| Rejection { error, id: Id::Null })
            .and_then(validate);

        let request = match validated {
            Ok(request) => request,
            Err(rejection) => {
                tracing::debug!(error = %rejection.error, id = %rejection.id, "Request rejected");
                self.record_error(rejection.error.code);
                return Some(JsonRpcResponse::error(rejection.error, rejection.id));
            }
        };

        let started = Instant::now();
        let outcome = self.invoke(&request, ctx).await;
        if let Some(metrics) = &self.metrics {
            let status = if outcome.is_ok() { "success" } else { "error" };
            metrics.record_request(&request.method, status, started.elapsed().as_secs_f64());
        }

        let Some(id) = request.id else {
            if let Err(e) = &outcome {
                tracing::debug!(method = %request.method, error = %e, "Notification failed");
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(result, id),
            Err(e) => {
                let error = ErrorObject::from(e);
                self.record_error(error.code);
                JsonRpcResponse::error(error, id)
            }
        })
    }

    /// Invoke a validated request, locally or through the proxy
    ///
    /// Cancelling the context's token resolves the call with
    /// [`Error::Cancelled`] without waiting for the handler.
    pub async fn invoke(&self, request: &JsonRpcRequest, ctx: &RequestContext) -> Result<Value> {
        let entry = self
            .registry
            .lookup(&request.method)
            .ok_or_else(|| Error::Rpc(ErrorObject::method_not_found()))?;

        let call_ctx = ctx.for_call(request.method.clone(), request.id.clone());
        let cancellation = call_ctx.cancellation.clone();
        let params = request.params.clone();
        let proxy = self.proxy.clone();
        let metrics = self.metrics.clone();

        let call = self.middleware.execute(call_ctx, move |ctx| async move {
            match entry {
                MethodEntry::Local(handler) => handler.handle(ctx, params).await,
                MethodEntry::Remote(url) => {
                    let outcome = proxy.call(&url, &ctx.method, params, &ctx).await;
                    if let Some(metrics) = &metrics {
                        metrics.record_proxy_call(if outcome.is_ok() { "success" } else { "error" });
                    }
                    outcome
                }
            }
        });

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(Error::Cancelled),
            outcome = call => outcome,
        }
    }

    fn record_error(&self, code: i32) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(code);
        }
    }
}
