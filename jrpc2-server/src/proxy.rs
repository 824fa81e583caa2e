//! Forwarding calls to remote JSON-RPC endpoints
//!
//! When a method resolves to a remote entry, the call is re-issued as a new
//! request (same method and params, fresh synthetic id) and POSTed to the
//! registered URL. The remote `result` or `error` comes back to the caller
//! unchanged; only the id differs.

use crate::context::RequestContext;
use jrpc2_core::codec;
use jrpc2_core::{Error, Id, JsonRpcRequest, JsonRpcResponse, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for proxied methods
#[derive(Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    next_id: Arc<AtomicI64>,
}

impl ProxyClient {
    /// Create a client whose calls time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self::with_client(http))
    }

    /// Wrap an existing reqwest client
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Forward `method` to `url`
    ///
    /// Transport failures, undecodable replies and replies with neither
    /// `result` nor `error` are Internal errors with the cause as `data`.
    /// Cancelling the context aborts the outbound request.
    #[tracing::instrument(skip(self, params, ctx), fields(url = %url))]
    pub async fn call(
        &self,
        url: &str,
        method: &str,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, Id::from(id));

        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => {
                tracing::debug!("Proxy call cancelled");
                Err(Error::Cancelled)
            }
            outcome = self.forward(url, &request) => outcome,
        }
    }

    async fn forward(&self, url: &str, request: &JsonRpcRequest) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        let reply = codec::decode_response(&body)
            .map_err(|e| Error::Internal(format!("{} (HTTP {})", e, status)))?;

        interpret_reply(reply)
    }
}

/// Turn a remote response object into the local outcome
fn interpret_reply(reply: JsonRpcResponse) -> Result<Value> {
    match reply {
        JsonRpcResponse {
            error: Some(error), ..
        } => Err(Error::Rpc(error)),
        JsonRpcResponse {
            result: Some(result),
            ..
        } => Ok(result),
        _ => Err(Error::Internal("unable to call provided method".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jrpc2_core::ErrorObject;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn reply(body: &str) -> Result<Value> {
        let response = codec::decode_response(body.as_bytes())
            .map_err(|e| Error::Internal(e.to_string()))?;
        interpret_reply(response)
    }

    #[test]
    fn test_interpret_result() {
        let value = reply(r#"{"jsonrpc":"2.0","result":19,"id":1}"#).unwrap();
        assert_eq!(value, json!(19));

        let null = reply(r#"{"jsonrpc":"2.0","result":null,"id":1}"#).unwrap();
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn test_interpret_error_passes_through() {
        let err = reply(
            r#"{"jsonrpc":"2.0","error":{"code":999,"message":"custom","data":[1]},"id":1}"#,
        )
        .unwrap_err();
        let object = ErrorObject::from(err);
        assert_eq!(object, ErrorObject::new(999, "custom").with_data(json!([1])));
    }

    #[test]
    fn test_interpret_malformed() {
        for body in [r#"{"jsonrpc":"2.0","id":1}"#, "[1, 2]", r#"{"error":5}"#, "<html>"] {
            let object = ErrorObject::from(reply(body).unwrap_err());
            assert_eq!(object.code, -32603);
            assert!(object.data.is_some());
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_internal_error() {
        let client = ProxyClient::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let err = client
            .call("http://127.0.0.1:9/rpc", "add", None, &RequestContext::new("add"))
            .await
            .unwrap_err();
        assert_eq!(ErrorObject::from(err).code, -32603);
    }

    #[tokio::test]
    async fn test_cancelled_call() {
        let client = ProxyClient::new(Duration::from_secs(30)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new("add").with_cancellation(token);

        // 192.0.2.0/24 is reserved for documentation and never answers.
        let err = client
            .call("http://192.0.2.1/rpc", "add", None, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
