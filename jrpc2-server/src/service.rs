//! HTTP service
//!
//! Turns an HTTP request into a dispatcher call and the [`Reply`] back into
//! an HTTP response. Everything that is not JSON-RPC level (path, verb,
//! content negotiation, body size) is decided here, before the dispatcher
//! sees the body:
//!
//! | Check | Status | Error |
//! |---|---|---|
//! | unknown path | 404 | Invalid Request |
//! | verb other than `POST` | 405 + `Allow: POST` | Invalid Request |
//! | `Content-Type` not JSON | 415 | Parse error |
//! | `Accept` excludes JSON | 406 | Parse error |
//! | body too large | 413 | Parse error |
//!
//! JSON-RPC level failures are always `200` with an error object; a reply
//! with nothing to say is `204`.

use crate::config::ServerConfig;
use crate::context::RequestContext;
use crate::dispatcher::{Dispatcher, Reply};
use crate::metrics::ServerMetrics;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, ACCEPT, ALLOW, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use jrpc2_core::{ErrorObject, Id, JsonRpcResponse};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const APPLICATION_JSON: &str = "application/json";

/// Hyper-facing service: routes, checks and dispatches HTTP requests
#[derive(Clone)]
pub struct RpcService {
    routes: Arc<HashMap<String, Dispatcher>>,
    config: Arc<ServerConfig>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl RpcService {
    /// Service over `routes`, keyed by path
    pub fn new(routes: HashMap<String, Dispatcher>, config: ServerConfig) -> Self {
        Self {
            routes: Arc::new(routes),
            config: Arc::new(config),
            metrics: None,
        }
    }

    /// Count HTTP responses by status
    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Dispatcher mounted at `path`
    pub fn dispatcher(&self, path: &str) -> Option<&Dispatcher> {
        self.routes.get(path)
    }

    /// Mounted paths
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Handle a request from a hyper connection
    #[tracing::instrument(skip_all, fields(http.method = %req.method(), path = %req.uri().path()))]
    pub async fn serve(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();
        let dispatcher = match self.preflight(&parts.method, parts.uri.path(), &parts.headers) {
            Ok(dispatcher) => dispatcher,
            Err(rejected) => return Ok(rejected),
        };

        let body = match Limited::new(body, self.config.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let status = if e.downcast_ref::<LengthLimitError>().is_some() {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::OK
                };
                tracing::debug!(error = %e, "Failed to read request body");
                return Ok(self.error_response(status, ErrorObject::parse_error().with_detail(e.to_string())));
            }
        };

        Ok(self.run(dispatcher, parts.headers, body).await)
    }

    /// Handle a request whose body has already been read
    pub async fn respond(
        &self,
        method: &Method,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        let dispatcher = match self.preflight(method, path, &headers) {
            Ok(dispatcher) => dispatcher,
            Err(rejected) => return rejected,
        };
        if body.len() > self.config.max_body_size {
            return self.error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorObject::parse_error().with_detail("length limit exceeded"),
            );
        }
        self.run(dispatcher, headers, body).await
    }

    fn preflight(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<&Dispatcher, Response<Full<Bytes>>> {
        let Some(dispatcher) = self.routes.get(path) else {
            return Err(self.error_response(
                StatusCode::NOT_FOUND,
                ErrorObject::invalid_request().with_detail(format!("no JSON-RPC endpoint at {}", path)),
            ));
        };

        if method != Method::POST {
            let mut response = self.error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorObject::invalid_request().with_detail("request method must be of POST type"),
            );
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            return Err(response);
        }

        let content_type_ok = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type)
            .is_some_and(|m| m.eq_ignore_ascii_case(APPLICATION_JSON));
        if !content_type_ok {
            return Err(self.error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorObject::parse_error()
                    .with_detail("Content-Type header must be set to 'application/json'"),
            ));
        }

        if self.config.require_accept && !accepts_json(headers) {
            return Err(self.error_response(
                StatusCode::NOT_ACCEPTABLE,
                ErrorObject::parse_error().with_detail("Accept header must be set to 'application/json'"),
            ));
        }

        Ok(dispatcher)
    }

    async fn run(&self, dispatcher: &Dispatcher, headers: HeaderMap, body: Bytes) -> Response<Full<Bytes>> {
        // Cancels in-flight calls if this future is dropped mid-request.
        let token = CancellationToken::new();
        let _guard = token.clone().drop_guard();

        let deadline = self.config.request_timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::debug!(?timeout, "Request deadline reached");
                token.cancel();
            })
        });

        let ctx = RequestContext::from_http(headers, token.clone());
        let reply = dispatcher.dispatch(&body, ctx).await;

        if let Some(deadline) = deadline {
            deadline.abort();
        }
        self.reply_response(&reply)
    }

    fn reply_response(&self, reply: &Reply) -> Response<Full<Bytes>> {
        match reply.encode() {
            Ok(None) => self.build_response(StatusCode::NO_CONTENT, None),
            Ok(Some(body)) => self.build_response(StatusCode::OK, Some(body)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode reply");
                self.error_response(
                    StatusCode::OK,
                    ErrorObject::internal_error().with_detail(e.to_string()),
                )
            }
        }
    }

    fn error_response(&self, status: StatusCode, error: ErrorObject) -> Response<Full<Bytes>> {
        let reply = Reply::Single(JsonRpcResponse::error(error, Id::Null));
        match reply.encode() {
            Ok(body) => self.build_response(status, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error reply");
                self.build_response(StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        }
    }

    fn build_response(&self, status: StatusCode, body: Option<String>) -> Response<Full<Bytes>> {
        let has_body = body.is_some();
        let mut response = Response::new(body.map(|b| Full::new(Bytes::from(b))).unwrap_or_default());
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.config.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_http_response(status.as_u16());
        }
        response
    }
}

/// Media type of a header value, parameters stripped
fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(media_type)
        .any(|m| {
            m.eq_ignore_ascii_case(APPLICATION_JSON)
                || m.eq_ignore_ascii_case("application/*")
                || m == "*/*"
        })
}
