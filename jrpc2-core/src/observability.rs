//! Logging and OpenTelemetry setup
//!
//! The server logs through the `tracing` facade. This module installs a
//! subscriber for it: an `EnvFilter`, a formatting layer (JSON or plain
//! text) and, when traces are enabled, an OpenTelemetry layer exporting spans
//! over OTLP/gRPC. Metrics get a periodic OTLP exporter.
//!
//! Nothing here is required to run a server. Without it, `tracing` events
//! are simply dropped.
//!
//! ```rust,no_run
//! use jrpc2_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("rpc-gateway")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     jrpc2_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the server ...
//!
//!     jrpc2_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter directives (e.g. "info", "jrpc2_server=debug")

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Providers installed by [`init_observability`], kept for shutdown
#[derive(Default)]
struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

static PROVIDERS: Mutex<Providers> = Mutex::new(Providers {
    tracer: None,
    meter: None,
});

fn installed() -> std::sync::MutexGuard<'static, Providers> {
    PROVIDERS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "jrpc2"
/// - Service version: the crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - Traces and metrics enabled, JSON logs
/// - Log level: `$RUST_LOG` or "info"
///
/// # Examples
///
/// ```rust
/// use jrpc2_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("rpc-gateway")
///     .with_version("1.2.3")
///     .with_metrics(false)
///     .with_json_logs(false);
/// assert!(!config.enable_metrics);
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,

    /// Service version attached to every span and metric
    pub service_version: String,

    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: String,

    /// Export spans over OTLP
    pub enable_traces: bool,

    /// Export metrics over OTLP
    pub enable_metrics: bool,

    /// Emit log lines as JSON objects instead of plain text
    pub json_logs: bool,

    /// `EnvFilter` directives used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "jrpc2".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            json_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Default configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the fallback log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Choose between JSON and plain-text log lines
    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the tracing subscriber and OpenTelemetry providers
///
/// Call once at startup. A second call fails because the global subscriber
/// is already set.
pub fn init_observability(
    config: ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // The tracer has to exist before the subscriber is built, since the
    // OpenTelemetry layer wraps it.
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    installed().tracer = Some(provider.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

/// Metrics are aggregated and exported every 30 seconds.
fn init_metrics(config: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(Duration::from_secs(30))
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    installed().meter = Some(provider.clone());
    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and tear down telemetry
///
/// Exports pending spans and metrics, then shuts the providers down. Safe to
/// call when nothing was installed, and more than once.
pub fn shutdown_observability() {
    let providers = std::mem::take(&mut *installed());

    if let Some(tracer) = providers.tracer {
        if let Err(e) = tracer.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(meter) = providers.meter {
        if let Err(e) = meter.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }

    tracing::info!("Observability shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "jrpc2");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.json_logs);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObservabilityConfig::new("gateway")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("2.0.0")
            .with_traces(false)
            .with_metrics(false)
            .with_json_logs(false);

        assert_eq!(config.service_name, "gateway");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "2.0.0");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_init_without_exporters() {
        let config = ObservabilityConfig::new("test-none")
            .with_traces(false)
            .with_metrics(false);

        assert!(init_observability(config.clone()).is_ok());
        // The global subscriber can only be installed once.
        assert!(init_observability(config).is_err());
        shutdown_observability();
    }

    #[test]
    fn test_shutdown_releases_providers() {
        installed().tracer = Some(SdkTracerProvider::builder().build());
        installed().meter = Some(SdkMeterProvider::builder().build());

        shutdown_observability();
        {
            let providers = installed();
            assert!(providers.tracer.is_none());
            assert!(providers.meter.is_none());
        }

        // Nothing left to shut down
        shutdown_observability();
    }
}
