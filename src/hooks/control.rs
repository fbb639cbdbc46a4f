//! Administrative route control.
//!
//! Operators can disable a route (or a whole subtree) at runtime without a
//! redeploy. The `onRequest` hook checks the matched route pattern against
//! the rule set: an exact match wins, otherwise ancestor wildcard rules
//! (`/blog/*`) are tried from the deepest prefix outward.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::pipeline::{HookError, HookFlow, Reply, RequestContext, RequestHook};

const DEFAULT_REASON: &str = "Route is temporarily disabled by an administrator.";

/// A single control rule keyed by route pattern or ancestor wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRule {
    /// Pattern the rule was registered under (`/blog/posts` or `/blog/*`).
    pub path: String,

    /// Message returned to callers.
    pub message: String,

    /// Status code for the short-circuit reply; 503 when unset.
    #[serde(default)]
    pub status_code: Option<u16>,

    /// Operator-provided explanation.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Shared, runtime-mutable rule set.
#[derive(Default)]
pub struct ControlRules {
    rules: DashMap<String, ControlRule>,
}

impl ControlRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, rule: ControlRule) {
        self.rules.insert(rule.path.clone(), rule);
    }

    /// Remove a rule; returns true when one existed.
    pub fn remove(&self, path: &str) -> bool {
        self.rules.remove(path).is_some()
    }

    /// Exact match first, then ancestor wildcards from deepest to shallowest.
    pub fn lookup(&self, route_path: &str) -> Option<ControlRule> {
        if let Some(rule) = self.rules.get(route_path) {
            return Some(rule.clone());
        }

        let segments: Vec<&str> = route_path.split('/').filter(|s| !s.is_empty()).collect();
        for depth in (0..segments.len()).rev() {
            let wildcard = format!("/{}/*", segments[..depth].join("/"))
                .replace("//", "/");
            if let Some(rule) = self.rules.get(&wildcard) {
                return Some(rule.clone());
            }
        }
        None
    }

    /// All active rules, for the admin surface.
    pub fn snapshot(&self) -> Vec<ControlRule> {
        self.rules.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// `onRequest` hook enforcing the rule set.
pub struct MessageControl {
    rules: Arc<ControlRules>,
}

impl MessageControl {
    pub fn new(rules: Arc<ControlRules>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl RequestHook for MessageControl {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        let Some(rule) = self.rules.lookup(&ctx.route_path) else {
            return Ok(HookFlow::Continue);
        };

        let status = rule
            .status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        tracing::info!(
            request_id = %ctx.request_id,
            route = %ctx.route_path,
            rule = %rule.path,
            status = %status,
            "Request blocked by control rule"
        );
        Ok(HookFlow::Respond(Reply::new(
            status,
            serde_json::json!({
                "message": rule.message,
                "controlRule": {
                    "path": rule.path,
                    "reason": rule.reason.as_deref().unwrap_or(DEFAULT_REASON),
                }
            }),
        )))
    }
}
