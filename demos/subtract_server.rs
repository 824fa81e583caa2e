//! Demo server with a few arithmetic methods
//!
//! ```text
//! cargo run --example subtract_server
//! curl -s -H 'Content-Type: application/json' -H 'Accept: application/json' \
//!     -d '{"jsonrpc":"2.0","method":"subtract","params":[42,23],"id":1}' \
//!     http://127.0.0.1:8080/jrpc
//! ```
//!
//! `JRPC2_BIND_ADDR`, `JRPC2_ROUTE` and `JRPC2_REQUEST_TIMEOUT_MS` override
//! the defaults. Send an `X-User` header to see it echoed by `say`.

use jrpc2::core::{init_observability, ObservabilityConfig, Result};
use jrpc2::server::{LoggingMiddleware, MiddlewareAction, ServerConfig, SyncMiddleware};
use jrpc2::{handler, FromPositional, Jrpc2Server, RequestContext};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, FromPositional)]
struct SubtractParams {
    minuend: f64,
    subtrahend: f64,
}

#[derive(Deserialize, FromPositional)]
struct SumParams {
    x: f64,
    y: f64,
}

#[derive(Deserialize, FromPositional)]
struct SayParams {
    message: String,
}

#[handler]
async fn subtract(p: SubtractParams) -> Result<f64> {
    Ok(p.minuend - p.subtrahend)
}

#[handler]
async fn sum(p: SumParams) -> Result<f64> {
    Ok(p.x + p.y)
}

#[handler]
async fn say(ctx: RequestContext, p: SayParams) -> Result<String> {
    let user = ctx
        .get_metadata("user")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(format!("{} {}!", p.message, user))
}

#[handler]
async fn update(_p: Value) -> Result<Value> {
    tracing::info!("update received");
    Ok(Value::Null)
}

struct UserFromHeader;

impl SyncMiddleware for UserFromHeader {
    fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
        if let Some(user) = ctx.header("x-user").map(str::to_owned) {
            ctx.insert_metadata("user", Value::String(user));
        }
        Ok(MiddlewareAction::Continue)
    }

    fn post_handle(&self, _ctx: &mut RequestContext, _result: &Result<Value>) -> Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_observability(
        ObservabilityConfig::new("subtract-server")
            .with_traces(false)
            .with_metrics(false),
    )?;

    let config = ServerConfig::from_env()?;
    let server = Jrpc2Server::builder()
        .config(config)
        .header("Access-Control-Allow-Origin", "*")?
        .header("Access-Control-Expose-Headers", "Content-Type")?
        .header("Access-Control-Allow-Methods", "POST")?
        .header("Access-Control-Allow-Headers", "Content-Type")?
        .use_sync_middleware(LoggingMiddleware)
        .use_sync_middleware(UserFromHeader)
        .handler("subtract", subtract())
        .handler("sum", sum())
        .handler("say", say())
        .handler("update", update())
        .build()
        .await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };
    server.run_until(shutdown).await?;
    jrpc2::core::shutdown_observability();
    Ok(())
}
