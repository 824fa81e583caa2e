//! Request-scoped context handed to middleware and handlers
//!
//! Each method invocation gets its own [`RequestContext`]. It carries the
//! method name and id, the inbound HTTP headers, a metadata map middleware
//! can fill in (an authenticated user, say), and a cancellation token tied
//! to the inbound HTTP request.

use http::HeaderMap;
use jrpc2_core::Id;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-invocation context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Method being called
    pub method: String,
    /// Request id; `None` for notifications
    pub id: Option<Id>,
    /// Headers of the HTTP request that carried the call
    pub headers: Arc<HeaderMap>,
    /// Values passed from middleware to handlers
    pub metadata: HashMap<String, Value>,
    /// Cancelled when the HTTP request goes away or hits its deadline
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Context for a call outside any HTTP request
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    /// Context rooted in an HTTP request
    pub fn from_http(headers: HeaderMap, cancellation: CancellationToken) -> Self {
        Self {
            headers: Arc::new(headers),
            cancellation,
            ..Default::default()
        }
    }

    /// Derive the context for one call within the same HTTP request
    pub fn for_call(&self, method: impl Into<String>, id: Option<Id>) -> Self {
        Self {
            method: method.into(),
            id,
            headers: Arc::clone(&self.headers),
            metadata: self.metadata.clone(),
            cancellation: self.cancellation.clone(),
        }
    }

    /// Replace the cancellation token
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Replace the header snapshot
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Arc::new(headers);
        self
    }

    /// A header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Insert metadata visible to later middleware and the handler
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Get metadata by key
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// True once the originating request was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_for_call_shares_headers_and_token() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user", HeaderValue::from_static("alice"));
        let token = CancellationToken::new();
        let root = RequestContext::from_http(headers, token.clone());

        let call = root.for_call("say", Some(Id::from(1)));
        assert_eq!(call.method, "say");
        assert_eq!(call.header("x-user"), Some("alice"));
        assert!(!call.is_cancelled());

        token.cancel();
        assert!(call.is_cancelled());
    }

    #[test]
    fn test_metadata() {
        let mut ctx = RequestContext::new("m");
        ctx.insert_metadata("user", Value::from("bob"));
        assert_eq!(ctx.get_metadata("user"), Some(&Value::from("bob")));
        assert!(ctx.get_metadata("missing").is_none());
    }
}
