//! Method registry: local handlers and remote proxies
//!
//! A [`Registry`] maps method names to either a local [`Handler`] or the URL
//! of another JSON-RPC endpoint the call is forwarded to. Clones share the
//! same table, so a registry handed to the server can still be extended at
//! runtime.
//!
//! Every registry starts with the reserved `jrpc2.register` method, which
//! lets clients wire in remote methods:
//!
//! ```json
//! {"jsonrpc":"2.0","method":"jrpc2.register","params":["add","http://calc:8080/jrpc"],"id":1}
//! ```
//!
//! # Registration Rules
//!
//! - `register` (local) overwrites silently, last write wins
//! - `register_remote` refuses names that already exist and URLs without an
//!   `http://` or `https://` scheme

use crate::context::RequestContext;
use crate::handler::{Handler, HandlerResult};
use jrpc2_core::params::{self, FromPositional, ParamsError};
use jrpc2_core::validate::is_reserved_name;
use jrpc2_core::{parse_params, Error, ErrorObject};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Name of the self-registration method present in every registry
pub const REGISTER_METHOD: &str = "jrpc2.register";

/// What a method name resolves to
#[derive(Clone)]
pub enum MethodEntry {
    /// Runs in this process
    Local(Arc<dyn Handler>),
    /// Forwarded to the JSON-RPC endpoint at this URL
    Remote(String),
}

impl std::fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodEntry::Local(_) => f.write_str("Local(..)"),
            MethodEntry::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
        }
    }
}

type MethodTable = RwLock<HashMap<String, MethodEntry>>;

/// Shared, thread-safe method table
#[derive(Clone)]
pub struct Registry {
    methods: Arc<MethodTable>,
}

impl Registry {
    /// Create a registry holding only `jrpc2.register`
    pub fn new() -> Self {
        let methods: Arc<MethodTable> = Arc::new(RwLock::new(HashMap::new()));
        let register = RegisterRemote {
            table: Arc::downgrade(&methods),
        };
        methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(REGISTER_METHOD.to_string(), MethodEntry::Local(Arc::new(register)));
        Self { methods }
    }

    /// Register a local handler, replacing any existing entry
    pub fn register(&self, name: impl Into<String>, handler: Box<dyn Handler>) {
        let name = name.into();
        tracing::debug!(method = %name, "Registering local method");
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, MethodEntry::Local(Arc::from(handler)));
    }

    /// Register a method that is proxied to `url`
    ///
    /// Fails with URL scheme error, Invalid params (reserved `rpc.` name) or
    /// Method exists. On failure the table is unchanged.
    pub fn register_remote(
        &self,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<(), ErrorObject> {
        insert_remote(&self.methods, name.into(), url.into())
    }

    /// Resolve a method name
    pub fn lookup(&self, name: &str) -> Option<MethodEntry> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// True if `name` is registered
    pub fn has_method(&self, name: &str) -> bool {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// All registered names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Remove a method, returning its entry
    pub fn remove(&self, name: &str) -> Option<MethodEntry> {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Number of registered methods, `jrpc2.register` included
    pub fn len(&self) -> usize {
        self.methods.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if every method, `jrpc2.register` included, was removed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_remote(table: &MethodTable, name: String, url: String) -> Result<(), ErrorObject> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ErrorObject::url_scheme_error().with_detail("url scheme must match http(s)://"));
    }
    if is_reserved_name(&name) {
        return Err(
            ErrorObject::invalid_params().with_detail("method cannot match the pattern rpc.*")
        );
    }

    // Check and insert under one write lock so concurrent registrations of
    // the same name cannot both succeed.
    let mut methods = table.write().unwrap_or_else(PoisonError::into_inner);
    if methods.contains_key(&name) {
        return Err(ErrorObject::method_exists().with_detail(format!("'{}' is already registered", name)));
    }
    tracing::info!(method = %name, url = %url, "Registered remote method");
    methods.insert(name, MethodEntry::Remote(url));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RegisterParams {
    name: String,
    url: String,
}

impl FromPositional for RegisterParams {
    fn from_positional(values: Vec<Value>) -> Result<Self, ParamsError> {
        params::expect_len(&values, 2)?;
        Ok(RegisterParams {
            name: params::decode_at(&values, 0)?,
            url: params::decode_at(&values, 1)?,
        })
    }
}

/// The `jrpc2.register` handler
///
/// Holds a weak reference so the table does not own itself.
struct RegisterRemote {
    table: Weak<MethodTable>,
}

impl Handler for RegisterRemote {
    fn handle(&self, _ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let table = self.table.clone();
        Box::pin(async move {
            let params: RegisterParams = parse_params(params)?;
            let table = table
                .upgrade()
                .ok_or_else(|| Error::Internal("registry no longer available".to_string()))?;
            insert_remote(&table, params.name, params.url)?;
            Ok::<_, Error>(Value::String("success".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use serde_json::json;

    fn constant(value: i64) -> Box<dyn Handler> {
        from_fn(move |_| async move { Ok(json!(value)) })
    }

    async fn call(entry: MethodEntry) -> Value {
        match entry {
            MethodEntry::Local(handler) => handler.handle(RequestContext::new("t"), None).await.unwrap(),
            MethodEntry::Remote(url) => Value::String(url),
        }
    }

    #[test]
    fn test_register_method_is_preseeded() {
        let registry = Registry::new();
        assert!(registry.has_method(REGISTER_METHOD));
        assert_eq!(registry.methods(), vec![REGISTER_METHOD.to_string()]);
    }

    #[tokio::test]
    async fn test_local_register_last_write_wins() {
        let registry = Registry::new();
        registry.register("answer", constant(1));
        registry.register("answer", constant(2));
        assert_eq!(call(registry.lookup("answer").unwrap()).await, json!(2));
    }

    #[test]
    fn test_register_remote() {
        let registry = Registry::new();
        registry.register_remote("add", "http://calc:8080/jrpc").unwrap();
        match registry.lookup("add") {
            Some(MethodEntry::Remote(url)) => assert_eq!(url, "http://calc:8080/jrpc"),
            other => panic!("Expected remote entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_remote_rejects_duplicates() {
        let registry = Registry::new();
        registry.register("add", constant(7));

        let err = registry.register_remote("add", "https://elsewhere/rpc").unwrap_err();
        assert_eq!(err.code, -32000);
        assert_eq!(call(registry.lookup("add").unwrap()).await, json!(7));

        registry.register_remote("mul", "https://a/rpc").unwrap();
        let err = registry.register_remote("mul", "https://b/rpc").unwrap_err();
        assert_eq!(err.message, "Method exists");
    }

    #[test]
    fn test_register_remote_rejects_bad_scheme() {
        let registry = Registry::new();
        for url in ["ftp://host/rpc", "host:8080", "", "HTTP//x"] {
            let err = registry.register_remote("m", url).unwrap_err();
            assert_eq!(err.code, -32001);
        }
        assert!(!registry.has_method("m"));
    }

    #[test]
    fn test_register_remote_rejects_reserved_names() {
        let registry = Registry::new();
        let err = registry.register_remote("rpc.sneaky", "http://x/rpc").unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn test_register_method_positional_and_named() {
        let registry = Registry::new();
        let MethodEntry::Local(register) = registry.lookup(REGISTER_METHOD).unwrap() else {
            panic!("jrpc2.register must be local");
        };
        let ctx = RequestContext::new(REGISTER_METHOD);

        let result = register
            .handle(ctx.clone(), Some(json!(["add", "http://other/rpc"])))
            .await
            .unwrap();
        assert_eq!(result, json!("success"));

        let result = register
            .handle(ctx.clone(), Some(json!({"name": "sub", "url": "https://other/rpc"})))
            .await
            .unwrap();
        assert_eq!(result, json!("success"));
        assert!(registry.has_method("add"));
        assert!(registry.has_method("sub"));

        let err = register
            .handle(ctx.clone(), Some(json!(["only-name"])))
            .await
            .unwrap_err();
        assert_eq!(ErrorObject::from(err).code, -32602);

        let err = register
            .handle(ctx, Some(json!(["add", "http://other/rpc"])))
            .await
            .unwrap_err();
        assert_eq!(ErrorObject::from(err).code, -32000);
    }

    #[tokio::test]
    async fn test_register_method_after_registry_dropped() {
        let registry = Registry::new();
        let MethodEntry::Local(register) = registry.lookup(REGISTER_METHOD).unwrap() else {
            panic!("jrpc2.register must be local");
        };
        drop(registry);

        let err = register
            .handle(RequestContext::new(REGISTER_METHOD), Some(json!(["a", "http://x"])))
            .await
            .unwrap_err();
        assert_eq!(ErrorObject::from(err).code, -32603);
    }

    #[test]
    fn test_clones_share_table() {
        let registry = Registry::new();
        let clone = registry.clone();
        clone.register("late", constant(0));
        assert!(registry.has_method("late"));
        assert!(registry.remove("late").is_some());
        assert!(!clone.has_method("late"));
        assert_eq!(registry.len(), 1);
    }
}
