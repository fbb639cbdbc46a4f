//! Compiled route storage.
//!
//! # Responsibilities
//! - Hold the flattened routes produced by compilation
//! - Provide lookup for dispatch wiring and tests
//! - Normalize paths (collapse repeated separators, no trailing slash)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Hook chains are stored pre-flattened; no merging happens at request time

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::Method;

use crate::compiler::lifecycle::LifecycleStage;
use crate::pipeline::{HookFn, RouteHandler};

/// One registered route with its flattened hook chains.
#[derive(Clone)]
pub struct CompiledRoute {
    pub method: Method,
    pub path: String,
    pub handler_name: String,
    pub handler: Arc<dyn RouteHandler>,

    /// Namespace-level hooks (tenant context, collection bindings), run
    /// before any staged hook.
    pub pre_execution: Vec<HookFn>,

    /// Active hooks per stage, in merge order. Stages with no active hooks
    /// are absent.
    pub stages: BTreeMap<LifecycleStage, Vec<HookFn>>,
}

impl CompiledRoute {
    pub fn stage_hooks(&self, stage: LifecycleStage) -> &[HookFn] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl std::fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: BTreeMap<_, _> = self
            .stages
            .iter()
            .map(|(stage, hooks)| (stage.as_str(), hooks.len()))
            .collect();
        f.debug_struct("CompiledRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &self.handler_name)
            .field("pre_execution", &self.pre_execution.len())
            .field("stages", &stages)
            .finish()
    }
}

/// The flattened routing table, frozen after compilation.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: CompiledRoute) {
        self.routes.push(route);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<&CompiledRoute> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.find(method, path).is_some()
    }
}

/// Collapse repeated separators and trailing slash; `""` becomes `/`.
pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    let mut previous_was_slash = true;
    for c in path.chars() {
        if c == '/' {
            if !previous_was_slash {
                out.push('/');
            }
            previous_was_slash = true;
        } else {
            out.push(c);
            previous_was_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Join a namespace prefix and a segment/suffix into a normalized path.
pub fn join_paths(prefix: &str, segment: &str) -> String {
    collapse_slashes(&format!("{prefix}/{segment}"))
}
