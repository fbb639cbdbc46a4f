//! Route compiler.
//!
//! # Data Flow
//! ```text
//! DefinitionNode tree (tenants → sections → routes)
//!     → walker.rs (recursive descent, depth-first, sequential)
//!         merge.rs  (inherited config ∪ local config)
//!         hooks.rs  (ordered hook maps, override/disable by identifier)
//!         resolver  (collection markers → storage bindings)
//!     → Registrar (flattened route registrations)
//!     → summary.rs (per-tenant compiled-route table)
//! ```
//!
//! # Design Decisions
//! - Compilation runs once at startup, before traffic; any failure is fatal
//! - The input tree is immutable; every merge produces fresh config
//! - Deterministic: hook order follows the insertion-order invariant

pub mod hooks;
pub mod lifecycle;
pub mod merge;
pub mod node;
pub mod summary;
pub mod walker;

use thiserror::Error;

use crate::storage::StorageError;

pub use hooks::{normalize_hook_info, HookConfig, HookInfo, HookMap};
pub use lifecycle::LifecycleStage;
pub use merge::{deep_merge, MergedConfig};
pub use node::{CollectionSpec, DefinitionNode, NodeValue, RouteDefinition};
pub use summary::{CompileSummary, RouteSummary, TenantSummary};
pub use walker::RouteCompiler;

/// Errors that abort a compilation run.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Storage provisioning failed for a tenant or collection.
    #[error("storage provisioning failed: {0}")]
    Storage(#[from] StorageError),

    /// The registrar rejected a route registration.
    #[error("route registration rejected for '{path}': {reason}")]
    Registration { path: String, reason: String },
}
