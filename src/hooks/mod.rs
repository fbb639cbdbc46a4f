//! Shared lifecycle hooks.
//!
//! These are the cross-cutting hooks that tenant trees attach at their root:
//! response caching, administrative route control, request audit logging,
//! and change logging for collection-backed routes. All of them implement
//! [`RequestHook`] and are registered by name in the definition tree, so any
//! nesting level can override or disable them.
//!
//! [`RequestHook`]: crate::pipeline::RequestHook

pub mod audit;
pub mod cache;
pub mod changelog;
pub mod control;

pub use audit::{AuditLogger, CapturePayload};
pub use cache::{CacheOnRequest, CacheOnSend, ResponseCache};
pub use changelog::{generate_diff, CaptureOldState, LogChanges};
pub use control::{ControlRule, ControlRules, MessageControl};
