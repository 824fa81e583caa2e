//! Server builder
//!
//! [`ServerBuilder`] collects the configuration, the registries and the
//! middleware, then binds the listener in [`ServerBuilder::build`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrpc2_server::{from_typed_fn, BatchMode, Jrpc2Server, Registry};
//!
//! # async fn example() -> jrpc2_core::Result<()> {
//! let admin = Registry::new();
//!
//! let server = Jrpc2Server::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .route("/jrpc")
//!     .handler("subtract", from_typed_fn(|(a, b): (i64, i64)| async move { Ok(a - b) }))
//!     .mount("/admin", admin)
//!     .batch_mode(BatchMode::Parallel)
//!     .max_batch_size(100)
//!     .header("Access-Control-Allow-Origin", "*")?
//!     .with_default_observability()
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::batch::{BatchMode, BatchProcessor};
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::handler::Handler;
use crate::metrics::ServerMetrics;
use crate::middleware::{Middleware, MiddlewareChain, SyncMiddleware};
use crate::proxy::ProxyClient;
use crate::registry::Registry;
use crate::service::RpcService;
use crate::Jrpc2Server;
use jrpc2_core::{Error, ObservabilityConfig, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Builder for [`Jrpc2Server`]
pub struct ServerBuilder {
    config: ServerConfig,
    registry: Registry,
    mounts: Vec<(String, Registry)>,
    middleware_chain: MiddlewareChain,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Builder with default configuration and an empty registry
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: Registry::new(),
            mounts: Vec::new(),
            middleware_chain: MiddlewareChain::new(),
            observability_config: None,
            service_name: None,
        }
    }

    /// Set the listen address
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Set the listen address from a string such as `"127.0.0.1:8080"`
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        self.config.bind_addr = addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid address {:?}: {}", addr, e)))?;
        Ok(self)
    }

    /// Path served by the default registry
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.config.route = route.into();
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a local method on the default route
    pub fn handler(self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.registry.register(method, handler);
        self
    }

    /// Use `registry` for the default route, replacing earlier handlers
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Serve another registry at `route`
    pub fn mount(mut self, route: impl Into<String>, registry: Registry) -> Self {
        self.mounts.push((route.into(), registry));
        self
    }

    /// Set the batch mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.config.batch_mode = mode;
        self
    }

    /// Limit the number of members per batch
    pub fn max_batch_size(mut self, max_size: usize) -> Self {
        self.config.max_batch_size = Some(max_size);
        self
    }

    /// Require an `Accept` header that allows JSON (on by default)
    pub fn require_accept(mut self, require: bool) -> Self {
        self.config.require_accept = require;
        self
    }

    /// Limit the request body size in bytes
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Cancel calls still running this long after the request arrived
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Timeout for calls forwarded to remote endpoints
    pub fn proxy_timeout(mut self, timeout: Duration) -> Self {
        self.config.proxy_timeout = timeout;
        self
    }

    /// Attach a header to every response
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        self.config = self.config.header_str(name, value)?;
        Ok(self)
    }

    /// Add middleware, applied on every route
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware_chain.add(middleware);
        self
    }

    /// Add sync middleware, applied on every route
    pub fn use_sync_middleware<T: SyncMiddleware + 'static>(mut self, middleware: T) -> Self {
        self.middleware_chain.add_sync(middleware);
        self
    }

    /// Enable logging, tracing and metrics with `config`
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable logging, tracing and metrics with default settings
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name reported to observability backends
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Bind the listener and assemble the server
    pub async fn build(self) -> Result<Jrpc2Server> {
        let mut registries = HashMap::new();
        let default_route = self.config.route.clone();
        for (route, registry) in
            std::iter::once((default_route.clone(), self.registry.clone())).chain(self.mounts)
        {
            if !route.starts_with('/') {
                return Err(Error::Config(format!("route {:?} must start with '/'", route)));
            }
            if registries.insert(route.clone(), registry).is_some() {
                return Err(Error::Config(format!("route {:?} mounted twice", route)));
            }
        }

        let metrics = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }
                jrpc2_core::init_observability(config).map_err(|e| {
                    Error::Internal(format!("Failed to initialize observability: {}", e))
                })?;
                Some(Arc::new(ServerMetrics::new()))
            }
            None => None,
        };

        let proxy = ProxyClient::new(self.config.proxy_timeout)?;
        let batch = BatchProcessor::with_limit(self.config.batch_mode, self.config.max_batch_size);

        let routes = registries
            .iter()
            .map(|(route, registry)| {
                let mut dispatcher = Dispatcher::new(registry.clone(), proxy.clone())
                    .with_middleware(self.middleware_chain.clone())
                    .with_batch(batch);
                if let Some(metrics) = &metrics {
                    dispatcher = dispatcher.with_metrics(Arc::clone(metrics));
                }
                (route.clone(), dispatcher)
            })
            .collect();

        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        let addr = listener.local_addr().map_err(|e| Error::Io(e.to_string()))?;

        let mut service = RpcService::new(routes, self.config);
        if let Some(metrics) = metrics {
            service = service.with_metrics(metrics);
        }

        let mut mounted: Vec<&str> = service.routes().collect();
        mounted.sort_unstable();
        tracing::info!(addr = %addr, routes = ?mounted, "Server listening");

        Ok(Jrpc2Server {
            listener,
            service,
            registry: self.registry,
            registries,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;

    fn local() -> ServerBuilder {
        ServerBuilder::new().bind_str("127.0.0.1:0").unwrap()
    }

    #[tokio::test]
    async fn test_builder_basic() {
        let handler = from_fn(|_| async { Ok(serde_json::json!({"status": "ok"})) });
        let server = local().handler("test", handler).build().await.unwrap();
        assert!(server.registry().has_method("test"));
        assert!(server.local_addr().is_ok());
    }

    #[tokio::test]
    async fn test_builder_mounts_routes() {
        let admin = Registry::new();
        admin.register("stats", from_fn(|_| async { Ok(serde_json::Value::Null) }));

        let server = local().mount("/admin", admin).build().await.unwrap();
        assert!(server.registry_for("/admin").unwrap().has_method("stats"));
        assert!(!server.registry_for("/jrpc").unwrap().has_method("stats"));
        assert!(server.registry_for("/missing").is_none());
    }

    #[tokio::test]
    async fn test_builder_rejects_bad_routes() {
        let err = local().route("jrpc").build().await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));

        let err = local()
            .mount("/jrpc", Registry::new())
            .build()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder_bind_str_invalid() {
        assert!(ServerBuilder::new().bind_str("invalid:address").is_err());
    }

    #[test]
    fn test_builder_setters() {
        let builder = ServerBuilder::default()
            .batch_mode(BatchMode::Sequential)
            .max_batch_size(10)
            .require_accept(false)
            .max_body_size(2048)
            .request_timeout(Duration::from_secs(1))
            .proxy_timeout(Duration::from_secs(2))
            .header("X-Served-By", "jrpc2")
            .unwrap();
        assert_eq!(builder.config.batch_mode, BatchMode::Sequential);
        assert_eq!(builder.config.max_batch_size, Some(10));
        assert!(!builder.config.require_accept);
        assert_eq!(builder.config.max_body_size, 2048);
        assert_eq!(builder.config.request_timeout, Some(Duration::from_secs(1)));
        assert_eq!(builder.config.proxy_timeout, Duration::from_secs(2));
        assert_eq!(builder.config.headers["x-served-by"], "jrpc2");
    }
}
