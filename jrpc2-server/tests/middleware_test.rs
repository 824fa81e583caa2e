//! Middleware integration tests

use jrpc2_core::{Error, ErrorObject, Result};
use jrpc2_server::{
    from_fn_with_context, Jrpc2Server, LoggingMiddleware, MetricsMiddleware, MiddlewareAction,
    RequestContext, SyncMiddleware,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Copies the `X-User` header into the context
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

/// Refuses calls to `admin.*` without a user
struct RequireUser;

impl SyncMiddleware for RequireUser {
    fn pre_handle(&self, ctx: &mut RequestContext) -> Result<MiddlewareAction> {
        if ctx.method.starts_with("admin.") && ctx.get_metadata("user").is_none() {
            return Err(Error::Rpc(ErrorObject::new(-32010, "Unauthorized")));
        }
        Ok(MiddlewareAction::Continue)
    }

    fn post_handle(&self, _ctx: &mut RequestContext, _result: &Result<Value>) -> Result<()> {
        Ok(())
    }
}

async fn call(url: &str, user: Option<&str>, body: Value) -> Value {
    let mut request = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .body(body.to_string());
    if let Some(user) = user {
        request = request.header("X-User", user);
    }
    request.send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn test_context_carries_user_to_handler() {
    let metrics = MetricsMiddleware::new();
    let server = Jrpc2Server::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .use_sync_middleware(LoggingMiddleware)
        .use_sync_middleware(UserFromHeader)
        .use_sync_middleware(RequireUser)
        .use_middleware(Arc::new(metrics.clone()))
        .handler(
            "whoami",
            from_fn_with_context(|ctx, _params| async move {
                Ok(ctx.get_metadata("user").cloned().unwrap_or(Value::Null))
            }),
        )
        .handler(
            "admin.reset",
            from_fn_with_context(|_ctx, _params| async move { Ok(json!("reset")) }),
        )
        .build()
        .await
        .unwrap();
    let url = format!("http://{}/jrpc", server.local_addr().unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server
            .run_until(async {
                let _ = rx.await;
            })
            .await
    });

    let body = call(&url, Some("alice"), json!({"jsonrpc": "2.0", "method": "whoami", "id": 1})).await;
    assert_eq!(body["result"], "alice");

    let body = call(&url, None, json!({"jsonrpc": "2.0", "method": "whoami", "id": 2})).await;
    assert_eq!(body["result"], Value::Null);

    let body = call(&url, None, json!({"jsonrpc": "2.0", "method": "admin.reset", "id": 3})).await;
    assert_eq!(body["error"], json!({"code": -32010, "message": "Unauthorized"}));

    let body = call(&url, Some("root"), json!({"jsonrpc": "2.0", "method": "admin.reset", "id": 4})).await;
    assert_eq!(body["result"], "reset");

    // The metrics middleware sits behind RequireUser, so it only sees calls
    // that were let through.
    assert_eq!(metrics.call_count(), 3);
    assert_eq!(metrics.failure_count(), 0);

    // Unknown methods never reach middleware.
    let body = call(&url, None, json!({"jsonrpc": "2.0", "method": "nope", "id": 5})).await;
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(metrics.call_count(), 3);

    let _ = tx.send(());
}
