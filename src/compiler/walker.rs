//! Recursive route-tree walker.
//!
//! # Responsibilities
//! - Walk the definition tree depth-first, merging hook config downward
//! - Provision tenant namespaces and collection bindings
//! - Register flattened routes with the registrar
//! - Accumulate the per-tenant compile summary
//!
//! # Design Decisions
//! - Sequential: tenants in order, subtrees depth-first, every storage call
//!   awaited before the next node (deterministic merge results)
//! - Provisioning failures propagate immediately; the caller treats any
//!   error as fatal to startup
//! - Lifecycle-stage names and `_`-prefixed keys never participate in path
//!   traversal, even if a tree somehow carries them as child keys

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::compiler::hooks::normalize_hook_info;
use crate::compiler::lifecycle::LifecycleStage;
use crate::compiler::merge::MergedConfig;
use crate::compiler::node::{DefinitionNode, NodeValue};
use crate::compiler::summary::{CompileSummary, RouteSummary};
use crate::compiler::CompileError;
use crate::pipeline::{HookError, HookFlow, RequestContext, RequestHook};
use crate::routing::{Registrar, RouteRegistration};
use crate::storage::{resolver, DocumentStore, ResourceBinding, StorageNamespace};

/// Compiles a definition tree into registered routes.
pub struct RouteCompiler {
    store: Arc<dyn DocumentStore>,
}

impl RouteCompiler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Compile the whole tree. Top-level keys are tenant names; root-level
    /// hooks become the global inherited config.
    pub async fn compile(
        &self,
        registrar: &mut dyn Registrar,
        root: &DefinitionNode,
    ) -> Result<CompileSummary, CompileError> {
        let global_config = root.local_config();
        let mut summary = CompileSummary::new();

        for (tenant_name, value) in &root.children {
            if is_reserved_key(tenant_name) {
                continue;
            }
            let tenant_node = match value {
                NodeValue::Group(node) => node,
                NodeValue::Route(_) => {
                    tracing::warn!(
                        key = %tenant_name,
                        "Route definition at tenant level ignored"
                    );
                    continue;
                }
            };

            tracing::info!(tenant = %tenant_name, "Compiling tenant");

            if !self.store.namespace_exists(tenant_name).await? {
                tracing::info!(tenant = %tenant_name, "Tenant namespace not found, creating");
                self.store.create_namespace(tenant_name).await?;
            }
            let namespace = self.store.namespace(tenant_name)?;

            let mut tenant_registrar = registrar.create_sub_namespace(tenant_name);
            tenant_registrar.add_pre_execution_hook(Arc::new(TenantContext {
                tenant: tenant_name.clone(),
                namespace: namespace.clone(),
            }));

            let mut entries = Vec::new();
            self.process_node(
                tenant_registrar.as_mut(),
                tenant_node,
                &global_config,
                &namespace,
                &mut entries,
            )
            .await
            .map_err(|err| {
                tracing::error!(tenant = %tenant_name, error = %err, "Tenant compilation failed");
                err
            })?;

            summary.push_tenant(tenant_name, entries);
        }

        Ok(summary)
    }

    /// Process one node: merge config, resolve collection bindings, then
    /// register routes and recurse into groups.
    fn process_node<'a>(
        &'a self,
        registrar: &'a mut dyn Registrar,
        node: &'a DefinitionNode,
        inherited: &'a MergedConfig,
        namespace: &'a Arc<dyn StorageNamespace>,
        entries: &'a mut Vec<RouteSummary>,
    ) -> Pin<Box<dyn Future<Output = Result<(), CompileError>> + Send + 'a>> {
        Box::pin(async move {
            let current_config = inherited.merged_with(&node.local_config());

            if let Some(spec) = &node.collection {
                if let Some(collection_name) = last_segment(registrar.prefix()) {
                    let binding = resolver::resolve(
                        namespace,
                        &collection_name,
                        &spec.indexes,
                        spec.changelog,
                    )
                    .await
                    .map_err(|err| {
                        tracing::error!(
                            collection = %collection_name,
                            namespace = %namespace.name(),
                            error = %err,
                            "Resource provisioning failed"
                        );
                        err
                    })?;
                    registrar.add_pre_execution_hook(Arc::new(InjectBindings { binding }));
                }
            }

            for (key, value) in &node.children {
                if is_reserved_key(key) {
                    tracing::debug!(key = %key, "Reserved key skipped in traversal");
                    continue;
                }
                match value {
                    NodeValue::Route(route) => {
                        let final_config = current_config.merged_with(&route.local_config());

                        let relative_path = match &route.path_suffix {
                            Some(suffix) => format!("/{key}{suffix}"),
                            None => format!("/{key}"),
                        };

                        let mut stages = BTreeMap::new();
                        for (stage, map) in final_config.hooks.iter() {
                            let flattened = map.flatten();
                            if !flattened.is_empty() {
                                stages.insert(stage, flattened);
                            }
                        }

                        let full_path = registrar.register(RouteRegistration {
                            method: route.method.clone(),
                            path: relative_path,
                            handler: route.handler.clone(),
                            stages,
                        })?;

                        entries.push(RouteSummary {
                            method: route.method.to_string(),
                            path: full_path,
                            handler: route.handler.name().to_string(),
                            hooks: normalize_hook_info(&final_config.hooks),
                        });
                    }
                    NodeValue::Group(group) => {
                        let mut sub_registrar = registrar.create_sub_namespace(key);
                        self.process_node(
                            sub_registrar.as_mut(),
                            group,
                            &current_config,
                            namespace,
                            entries,
                        )
                        .await?;
                    }
                }
            }

            Ok(())
        })
    }
}

/// Keys that never participate in path traversal: lifecycle-stage names and
/// the reserved `_` marker prefix.
fn is_reserved_key(key: &str) -> bool {
    key.starts_with('_') || LifecycleStage::from_key(key).is_some()
}

/// Last segment of a namespace prefix: the collection name for a marked node.
fn last_segment(prefix: &str) -> Option<String> {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Pre-execution hook installed per tenant: injects the tenant's storage
/// namespace and identity into every request under the tenant prefix.
struct TenantContext {
    tenant: String,
    namespace: Arc<dyn StorageNamespace>,
}

#[async_trait]
impl RequestHook for TenantContext {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        ctx.namespace = Some(self.namespace.clone());
        ctx.params
            .insert("tenantName".to_string(), self.tenant.clone());
        Ok(HookFlow::Continue)
    }
}

/// Pre-execution hook installed per collection-marked subtree: injects the
/// resolved collection handles.
struct InjectBindings {
    binding: ResourceBinding,
}

#[async_trait]
impl RequestHook for InjectBindings {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        ctx.bindings = Some(self.binding.clone());
        Ok(HookFlow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved_key("_indexes"));
        assert!(is_reserved_key("onRequest"));
        assert!(is_reserved_key("preHandler"));
        assert!(!is_reserved_key("posts"));
        assert!(!is_reserved_key("onboarding"));
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("/blog/posts"), Some("posts".to_string()));
        assert_eq!(last_segment("/blog"), Some("blog".to_string()));
        assert_eq!(last_segment("/"), None);
        assert_eq!(last_segment(""), None);
    }
}
