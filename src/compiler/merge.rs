//! Configuration merging.
//!
//! # Responsibilities
//! - Merge inherited config with a node's local config
//! - Union-merge hook stages (override/disable by identifier)
//! - Deep-merge non-hook pass-through fields (schema, resource config)
//!
//! # Design Decisions
//! - Always returns a fresh value; neither input is mutated
//! - Total over well-formed inputs: no error paths
//! - Generic deep merge is restricted to the JSON pass-through fields
//!   rather than reflecting over arbitrary structures

use serde_json::{Map, Value};

use crate::compiler::hooks::HookConfig;

/// The effective configuration visible at a tree position after merging.
#[derive(Clone, Debug, Default)]
pub struct MergedConfig {
    /// Per-stage hook maps, merged downward.
    pub hooks: HookConfig,

    /// Non-hook pass-through fields (schema, resource config), deep-merged.
    pub extra: Map<String, Value>,
}

impl MergedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hooks(hooks: HookConfig) -> Self {
        Self {
            hooks,
            extra: Map::new(),
        }
    }

    /// Merge `child` over `self`.
    ///
    /// Hook stages union-merge per the identifier override rules; every other
    /// field deep-merges with child winning on scalar conflicts. Keys present
    /// only in the parent are preserved unchanged.
    pub fn merged_with(&self, child: &MergedConfig) -> MergedConfig {
        let mut extra = self.extra.clone();
        for (key, child_value) in &child.extra {
            let merged = match extra.get(key) {
                Some(parent_value) => deep_merge(parent_value, child_value),
                None => child_value.clone(),
            };
            extra.insert(key.clone(), merged);
        }

        MergedConfig {
            hooks: self.hooks.merged_with(&child.hooks),
            extra,
        }
    }
}

/// Generic deep merge over JSON values.
///
/// Objects merge recursively; scalars, arrays, and mismatched shapes are
/// replaced wholesale by the child.
pub fn deep_merge(parent: &Value, child: &Value) -> Value {
    match (parent, child) {
        (Value::Object(parent_map), Value::Object(child_map)) => {
            let mut merged = parent_map.clone();
            for (key, child_value) in child_map {
                let value = match merged.get(key) {
                    Some(parent_value) => deep_merge(parent_value, child_value),
                    None => child_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        _ => child.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_objects_recurse() {
        let parent = json!({"schema": {"body": {"type": "object"}, "tags": ["a"]}});
        let child = json!({"schema": {"response": {"200": {}}, "tags": ["b"]}});
        let merged = deep_merge(&parent, &child);

        assert_eq!(
            merged,
            json!({
                "schema": {
                    "body": {"type": "object"},
                    "response": {"200": {}},
                    "tags": ["b"]
                }
            })
        );
    }

    #[test]
    fn test_deep_merge_child_wins_on_scalars() {
        assert_eq!(deep_merge(&json!(1), &json!(2)), json!(2));
        assert_eq!(deep_merge(&json!({"a": 1}), &json!("x")), json!("x"));
        assert_eq!(deep_merge(&json!([1, 2]), &json!([3])), json!([3]));
    }

    #[test]
    fn test_merged_config_preserves_parent_only_keys() {
        let mut parent = MergedConfig::new();
        parent.extra.insert("resource".into(), json!({"name": "posts"}));
        let mut child = MergedConfig::new();
        child.extra.insert("schema".into(), json!({"body": {}}));

        let merged = parent.merged_with(&child);
        assert_eq!(merged.extra["resource"], json!({"name": "posts"}));
        assert_eq!(merged.extra["schema"], json!({"body": {}}));
        // inputs untouched
        assert!(parent.extra.contains_key("resource"));
        assert!(!parent.extra.contains_key("schema"));
    }
}
