//! Server configuration
//!
//! [`ServerConfig`] holds everything the HTTP side needs to know. It is
//! usually filled in through [`ServerBuilder`](crate::ServerBuilder), but can
//! also be built directly and overlaid from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `JRPC2_BIND_ADDR` | `bind_addr` |
//! | `JRPC2_ROUTE` | `route` |
//! | `JRPC2_REQUEST_TIMEOUT_MS` | `request_timeout` |

use crate::batch::BatchMode;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use jrpc2_core::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Route served when none is configured
pub const DEFAULT_ROUTE: &str = "/jrpc";

/// Default request body limit: 1 MiB
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default timeout for proxied calls
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Path of the default route
    pub route: String,
    /// Headers attached to every response
    pub headers: HeaderMap,
    /// Reject requests whose `Accept` header does not allow JSON
    pub require_accept: bool,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
    /// Deadline for one HTTP request, batch included
    pub request_timeout: Option<Duration>,
    /// Timeout for calls forwarded to remote endpoints
    pub proxy_timeout: Duration,
    /// Batch execution mode
    pub batch_mode: BatchMode,
    /// Largest accepted batch
    pub max_batch_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            route: DEFAULT_ROUTE.to_string(),
            headers: HeaderMap::new(),
            require_accept: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: None,
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
            batch_mode: BatchMode::default(),
            max_batch_size: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `JRPC2_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(addr) = lookup("JRPC2_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| Error::Config(format!("JRPC2_BIND_ADDR: {}", e)))?;
        }
        if let Some(route) = lookup("JRPC2_ROUTE") {
            self.route = route;
        }
        if let Some(ms) = lookup("JRPC2_REQUEST_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| Error::Config(format!("JRPC2_REQUEST_TIMEOUT_MS: {}", e)))?;
            self.request_timeout = Some(Duration::from_millis(ms));
        }
        Ok(self)
    }

    /// Add a response header from strings
    pub fn header_str(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid header value {:?}: {}", value, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the default route
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Set the per-request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.route, "/jrpc");
        assert!(config.require_accept);
        assert_eq!(config.max_body_size, 1024 * 1024);
        assert_eq!(config.proxy_timeout, Duration::from_secs(30));
        assert_eq!(config.batch_mode, BatchMode::Parallel);
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_overlay() {
        let vars: HashMap<&str, &str> = [
            ("JRPC2_BIND_ADDR", "0.0.0.0:9000"),
            ("JRPC2_ROUTE", "/rpc"),
            ("JRPC2_REQUEST_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::default()
            .overlay(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.route, "/rpc");
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_overlay_rejects_bad_values() {
        let err = ServerConfig::default()
            .overlay(|key| (key == "JRPC2_REQUEST_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_header_str() {
        let config = ServerConfig::default()
            .header_str("Access-Control-Allow-Origin", "*")
            .unwrap();
        assert_eq!(config.headers["access-control-allow-origin"], "*");
        assert!(ServerConfig::default().header_str("bad header", "x").is_err());
    }
}
