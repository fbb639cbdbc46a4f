//! Typed route definition tree.
//!
//! # Design Decisions
//! - Node classification is a tagged variant (`NodeValue`), decided once at
//!   construction, instead of field probing at every call site
//! - The collection marker and its index list are explicit fields rather
//!   than sentinel-prefixed keys; the walker still filters sentinel-looking
//!   child keys to keep the enumerated-stage policy intact
//! - Children keep insertion order; re-adding a key replaces its value

use std::sync::Arc;

use axum::http::Method;
use serde_json::{Map, Value};

use crate::compiler::hooks::HookConfig;
use crate::compiler::lifecycle::LifecycleStage;
use crate::compiler::merge::MergedConfig;
use crate::pipeline::{HookFn, RouteHandler};
use crate::storage::IndexSpec;

/// A group node in the definition tree: tenant, section, or nested group.
#[derive(Clone, Default)]
pub struct DefinitionNode {
    /// Lifecycle hooks declared at this level.
    pub hooks: HookConfig,

    /// Collection marker: present when this node backs a storage collection.
    pub collection: Option<CollectionSpec>,

    /// Path-segment children, in insertion order.
    pub children: Vec<(String, NodeValue)>,
}

/// A child of a definition node.
#[derive(Clone)]
pub enum NodeValue {
    Group(DefinitionNode),
    Route(RouteDefinition),
}

/// Collection marker: index specs to apply on first creation, plus whether a
/// changelog collection should back this resource.
#[derive(Clone, Debug, Default)]
pub struct CollectionSpec {
    pub indexes: Vec<IndexSpec>,
    pub changelog: bool,
}

impl CollectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, spec: IndexSpec) -> Self {
        self.indexes.push(spec);
        self
    }

    pub fn with_changelog(mut self) -> Self {
        self.changelog = true;
        self
    }
}

impl DefinitionNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a lifecycle hook at this level.
    pub fn hook(mut self, stage: LifecycleStage, name: impl Into<String>, hook: HookFn) -> Self {
        self.hooks.insert(stage, name, Some(hook));
        self
    }

    /// Disable an inherited hook for this subtree.
    pub fn disable_hook(mut self, stage: LifecycleStage, name: impl Into<String>) -> Self {
        self.hooks.insert(stage, name, None);
        self
    }

    /// Mark this node as backing a storage collection.
    pub fn collection(mut self, spec: CollectionSpec) -> Self {
        self.collection = Some(spec);
        self
    }

    /// Add a nested group under `key`. Re-adding a key replaces it.
    pub fn child(mut self, key: impl Into<String>, node: DefinitionNode) -> Self {
        self.insert_child(key.into(), NodeValue::Group(node));
        self
    }

    /// Add a terminal route under `key`.
    pub fn route(mut self, key: impl Into<String>, route: RouteDefinition) -> Self {
        self.insert_child(key.into(), NodeValue::Route(route));
        self
    }

    fn insert_child(&mut self, key: String, value: NodeValue) {
        match self.children.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.children.push((key, value)),
        }
    }

    /// Fetch a child by key.
    pub fn get(&self, key: &str) -> Option<&NodeValue> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The node's local config: only its hook declarations. Path-segment
    /// children and markers never leak into the merged config.
    pub fn local_config(&self) -> MergedConfig {
        MergedConfig::from_hooks(self.hooks.clone())
    }
}

/// A leaf route: one method/handler/path combination.
#[derive(Clone)]
pub struct RouteDefinition {
    pub method: Method,
    pub handler: Arc<dyn RouteHandler>,

    /// Optional path suffix appended after the route's key (e.g. `/{id}`).
    pub path_suffix: Option<String>,

    /// Local hook overrides for this route only.
    pub hooks: HookConfig,

    /// Pass-through fields (schema, resource config).
    pub extra: Map<String, Value>,
}

impl RouteDefinition {
    pub fn new(method: Method, handler: Arc<dyn RouteHandler>) -> Self {
        Self {
            method,
            handler,
            path_suffix: None,
            hooks: HookConfig::new(),
            extra: Map::new(),
        }
    }

    pub fn get(handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::GET, handler)
    }

    pub fn post(handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::POST, handler)
    }

    pub fn patch(handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::PATCH, handler)
    }

    pub fn delete(handler: Arc<dyn RouteHandler>) -> Self {
        Self::new(Method::DELETE, handler)
    }

    pub fn path(mut self, suffix: impl Into<String>) -> Self {
        self.path_suffix = Some(suffix.into());
        self
    }

    pub fn hook(mut self, stage: LifecycleStage, name: impl Into<String>, hook: HookFn) -> Self {
        self.hooks.insert(stage, name, Some(hook));
        self
    }

    pub fn disable_hook(mut self, stage: LifecycleStage, name: impl Into<String>) -> Self {
        self.hooks.insert(stage, name, None);
        self
    }

    /// Attach a request/response schema (pass-through, deep-merged downward).
    pub fn schema(mut self, schema: Value) -> Self {
        self.extra.insert("schema".to_string(), schema);
        self
    }

    /// Attach an arbitrary pass-through config field.
    pub fn config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The route's local config: hooks plus pass-through fields.
    pub fn local_config(&self) -> MergedConfig {
        MergedConfig {
            hooks: self.hooks.clone(),
            extra: self.extra.clone(),
        }
    }
}
