//! Hook and handler traits.
//!
//! # Design Decisions
//! - Hooks are single-method trait objects stored by identifier in ordered
//!   maps; the identifier lives in the map, not the hook itself
//! - Handlers carry their own name for the compile summary
//! - Errors are a closed enum; unexpected hook failures map to 500 upstream

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::pipeline::context::{Reply, RequestContext};
use crate::storage::StorageError;

/// Shared handle to a lifecycle hook, as stored in the route table.
pub type HookFn = Arc<dyn RequestHook>;

/// Outcome of a single hook invocation.
pub enum HookFlow {
    /// Proceed to the next hook or stage.
    Continue,
    /// Short-circuit the chain with this reply.
    Respond(Reply),
}

/// Errors surfaced by hooks and handlers.
#[derive(Debug, Error)]
pub enum HookError {
    /// Storage operation failed inside a hook or handler.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Route ran outside a collection-marked subtree but needed bindings.
    #[error("no collection bindings injected for route '{0}'")]
    MissingBinding(String),

    /// Tenant namespace injection did not run for this route.
    #[error("no storage namespace injected for route '{0}'")]
    MissingNamespace(String),

    /// Request body missing or not the expected shape.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// A lifecycle hook: one stage's worth of per-request behavior.
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError>;
}

/// A terminal route handler.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    /// Handler name reported in the compile summary.
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError>;
}
