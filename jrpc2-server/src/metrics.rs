//! OpenTelemetry metrics for the server
//!
//! Instruments are created from the global meter provider, which
//! `init_observability` configures. Without it they are no-ops.
//!
//! - **jrpc2.server.requests.total**: calls by method and status (counter)
//! - **jrpc2.server.request.duration**: call latency in seconds (histogram)
//! - **jrpc2.server.batch.size**: members per batch (histogram)
//! - **jrpc2.server.errors.total**: error responses by code (counter)
//! - **jrpc2.server.proxy.calls**: forwarded calls by outcome (counter)
//! - **jrpc2.server.http.responses**: HTTP responses by status (counter)

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Server metric instruments
#[derive(Clone)]
pub struct ServerMetrics {
    /// Calls by method and status
    pub requests_total: Counter<u64>,
    /// Call duration in seconds
    pub request_duration: Histogram<f64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
    /// Error responses by code
    pub errors_total: Counter<u64>,
    /// Proxied calls by outcome
    pub proxy_calls: Counter<u64>,
    /// HTTP responses by status code
    pub http_responses: Counter<u64>,
}

impl ServerMetrics {
    /// Instruments from the global meter provider
    pub fn new() -> Self {
        Self::new_with_meter(&global::meter("jrpc2-server"))
    }

    /// Instruments from a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("jrpc2.server.requests.total")
                .with_description("Total number of calls dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("jrpc2.server.request.duration")
                .with_description("Call duration in seconds")
                .with_unit("s")
                .build(),
            batch_size: meter
                .u64_histogram("jrpc2.server.batch.size")
                .with_description("Number of members in batch requests")
                .build(),
            errors_total: meter
                .u64_counter("jrpc2.server.errors.total")
                .with_description("Total number of error responses")
                .build(),
            proxy_calls: meter
                .u64_counter("jrpc2.server.proxy.calls")
                .with_description("Total number of calls forwarded to remote endpoints")
                .build(),
            http_responses: meter
                .u64_counter("jrpc2.server.http.responses")
                .with_description("Total number of HTTP responses written")
                .build(),
        }
    }

    /// Record one dispatched call
    pub fn record_request(&self, method: &str, status: &'static str, duration_secs: f64) {
        let attributes = [
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status),
        ];
        self.requests_total.add(1, &attributes);
        self.request_duration.record(duration_secs, &attributes);
    }

    /// Record a batch request
    pub fn record_batch(&self, size: u64, mode: &'static str) {
        self.batch_size.record(size, &[KeyValue::new("mode", mode)]);
    }

    /// Record an error response
    pub fn record_error(&self, code: i32) {
        self.errors_total.add(1, &[KeyValue::new("code", i64::from(code))]);
    }

    /// Record a forwarded call
    pub fn record_proxy_call(&self, outcome: &'static str) {
        self.proxy_calls.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    /// Record an HTTP response
    pub fn record_http_response(&self, status: u16) {
        self.http_responses
            .add(1, &[KeyValue::new("status", i64::from(status))]);
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}
