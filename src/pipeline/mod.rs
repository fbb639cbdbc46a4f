//! Per-request execution pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request (method, path, params, body)
//!     → context.rs (RequestContext assembled by the HTTP layer)
//!     → runner.rs (pre-execution hooks, staged hooks, handler)
//!     → Reply (status, headers, JSON body)
//! ```
//!
//! # Design Decisions
//! - Hooks and handlers are trait objects behind `Arc` (shared by the table)
//! - One chain runs sequentially per request; many requests run concurrently
//! - A hook may short-circuit with a reply; response stages still run

pub mod context;
pub mod hook;
pub mod runner;

pub use context::{Reply, RequestContext};
pub use hook::{HookError, HookFlow, HookFn, RequestHook, RouteHandler};
pub use runner::run_route;
