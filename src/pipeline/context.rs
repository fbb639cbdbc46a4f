//! Request context and reply types.
//!
//! The context is the single mutable value threaded through a route's hook
//! chain. Pre-execution hooks installed by the compiler populate the storage
//! fields; lifecycle hooks communicate through `state`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use crate::pipeline::hook::HookError;
use crate::storage::{ResourceBinding, StorageNamespace};

/// Mutable per-request state passed to every hook and handler in a chain.
pub struct RequestContext {
    /// Correlation ID, taken from `x-request-id` or generated.
    pub request_id: String,

    /// Request method.
    pub method: Method,

    /// Actual request path (e.g. `/blog/posts/42`).
    pub path: String,

    /// Registered route pattern the request matched (e.g. `/blog/posts/{id}`).
    pub route_path: String,

    /// Path parameters, including the injected `tenantName`.
    pub params: HashMap<String, String>,

    /// Query string parameters.
    pub query: HashMap<String, String>,

    /// Parsed JSON body, if any.
    pub body: Option<Value>,

    /// Tenant storage namespace, injected by the tenant pre-execution hook.
    pub namespace: Option<Arc<dyn StorageNamespace>>,

    /// Collection handles, injected under collection-marked subtrees.
    pub bindings: Option<ResourceBinding>,

    /// Scratch space shared between hooks in the same chain.
    pub state: HashMap<String, Value>,

    /// Response headers accumulated by hooks (e.g. `X-Cache`).
    pub response_headers: Vec<(String, String)>,

    /// The reply, present once the handler (or a short-circuiting hook) ran.
    pub reply: Option<Reply>,
}

impl RequestContext {
    /// Create a context for the given method/paths. Remaining fields start empty.
    pub fn new(method: Method, path: impl Into<String>, route_path: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            route_path: route_path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            body: None,
            namespace: None,
            bindings: None,
            state: HashMap::new(),
            response_headers: Vec::new(),
            reply: None,
        }
    }

    /// Look up a path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Collection bindings, or an error if the route is not under a
    /// collection-marked subtree.
    pub fn require_bindings(&self) -> Result<&ResourceBinding, HookError> {
        self.bindings
            .as_ref()
            .ok_or_else(|| HookError::MissingBinding(self.route_path.clone()))
    }

    /// Tenant namespace, or an error if tenant injection did not run.
    pub fn require_namespace(&self) -> Result<&Arc<dyn StorageNamespace>, HookError> {
        self.namespace
            .as_ref()
            .ok_or_else(|| HookError::MissingNamespace(self.route_path.clone()))
    }

    /// Store a scratch value for later hooks in the chain.
    pub fn put_state(&mut self, key: &str, value: Value) {
        self.state.insert(key.to_string(), value);
    }

    /// Read a scratch value left by an earlier hook.
    pub fn state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Add a response header.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.response_headers.push((name.to_string(), value.into()));
    }
}

/// A JSON reply produced by a handler or a short-circuiting hook.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl Reply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn created(body: Value) -> Self {
        Self::new(StatusCode::CREATED, body)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, Value::Null)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": message }),
        )
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_injections_error() {
        let ctx = RequestContext::new(Method::GET, "/blog/posts", "/blog/posts");
        assert!(ctx.require_bindings().is_err());
        assert!(ctx.require_namespace().is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let mut ctx = RequestContext::new(Method::GET, "/x", "/x");
        ctx.put_state("cache.eligible", Value::Bool(true));
        assert_eq!(ctx.state("cache.eligible"), Some(&Value::Bool(true)));
        assert_eq!(ctx.state("missing"), None);
    }

    #[test]
    fn test_reply_helpers() {
        let reply = Reply::ok(serde_json::json!({"a": 1})).with_header("X-Cache", "HIT");
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.headers.len(), 1);
        assert_eq!(Reply::no_content().status, StatusCode::NO_CONTENT);
    }
}
