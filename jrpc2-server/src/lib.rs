//! JSON-RPC 2.0 server over HTTP
//!
//! Accepts `POST` requests carrying JSON-RPC request objects or batches of
//! them. Each valid call goes to a registered method; the response object is
//! written back unless the call was a notification.
//!
//! # Core Features
//!
//! - **Local methods**: async handlers with raw or typed params
//! - **Named and positional params**: typed handlers accept both calling
//!   conventions through [`jrpc2_core::FromPositional`]
//! - **Remote methods**: calls forwarded to another JSON-RPC endpoint, also
//!   registrable at runtime through the `jrpc2.register` method
//! - **Batches**: parallel, sequential or disabled
//! - **Middleware**: hooks around every call with access to HTTP headers
//! - **Observability**: `tracing` spans and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jrpc2_server::{from_typed_fn, Jrpc2Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Jrpc2Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("subtract", from_typed_fn(|(a, b): (i64, i64)| async move {
//!             Ok(a - b)
//!         }))
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! One tokio task per TCP connection, served by hyper's HTTP/1 connection
//! builder. Each HTTP request runs the [`RpcService`] checks, then the
//! route's [`Dispatcher`]. Batch members run as separate tasks in parallel
//! mode. Every request carries a cancellation token that fires when the
//! client goes away or the request deadline passes.

mod batch;
mod builder;
mod config;
mod context;
mod dispatcher;
mod handler;
mod metrics;
mod middleware;
mod proxy;
mod registry;
mod service;

pub use batch::{BatchMode, BatchProcessor};
pub use builder::ServerBuilder;
pub use config::{ServerConfig, DEFAULT_MAX_BODY_SIZE, DEFAULT_PROXY_TIMEOUT, DEFAULT_ROUTE};
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, Reply};
pub use handler::{
    from_fn, from_fn_with_context, from_typed_fn, from_typed_fn_with_context, AsyncHandler,
    Handler, HandlerResult,
};
pub use metrics::ServerMetrics;
pub use middleware::{
    LoggingMiddleware, MetricsMiddleware, Middleware, MiddlewareAction, MiddlewareChain,
    SyncMiddleware,
};
pub use proxy::ProxyClient;
pub use registry::{MethodEntry, Registry, REGISTER_METHOD};
pub use service::RpcService;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use jrpc2_core::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// JSON-RPC 2.0 server over HTTP
///
/// Built with [`Jrpc2Server::builder`]. The listener is bound by then, so
/// [`local_addr`](Self::local_addr) is valid before [`run`](Self::run).
pub struct Jrpc2Server {
    listener: TcpListener,
    service: RpcService,
    /// Registry of the default route
    registry: Registry,
    registries: HashMap<String, Registry>,
}

impl Jrpc2Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Io(e.to_string()))
    }

    /// Registry of the default route
    ///
    /// Registries are shared handles: methods added here after the server
    /// started are visible to the next request.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry mounted at `route`
    pub fn registry_for(&self, route: &str) -> Option<&Registry> {
        self.registries.get(route)
    }

    /// The HTTP service, usable without a socket
    pub fn service(&self) -> &RpcService {
        &self.service
    }

    /// Accept connections until the process ends
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Connections already accepted finish on their own tasks.
    #[tracing::instrument(skip_all, name = "server.run")]
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(addr = ?self.listener.local_addr().ok(), "Starting JSON-RPC server");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    tracing::debug!(peer = %peer, "Connection accepted");

                    let service = self.service.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req| {
                            let service = service.clone();
                            async move { service.serve(req).await }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                            tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    });
                }
            }
        }
    }
}
