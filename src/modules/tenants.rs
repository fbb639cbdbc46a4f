//! Demo tenant trees.
//!
//! Two tenants exercise the compiler end to end: a blog with change-logged
//! posts and an ecommerce catalog with a unique SKU index. The root node
//! carries the global hooks every tenant inherits, both tenants carry the
//! audit-logging module, and the products subtree disables request logging
//! to show per-subtree overrides.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::compiler::{DefinitionNode, LifecycleStage, RouteDefinition};
use crate::hooks::{CacheOnRequest, CacheOnSend, ControlRules, MessageControl, ResponseCache};
use crate::modules::audit::audit_module;
use crate::modules::resource::{resource_routes, ResourceOptions};
use crate::pipeline::{HookError, HookFlow, Reply, RequestContext, RequestHook, RouteHandler};
use crate::storage::IndexSpec;

/// `onRequest` hook logging every request under the tree.
struct LogRequest;

#[async_trait]
impl RequestHook for LogRequest {
    async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
            "Incoming request"
        );
        Ok(HookFlow::Continue)
    }
}

struct TenantStatus;

#[async_trait]
impl RouteHandler for TenantStatus {
    fn name(&self) -> &str {
        "tenantStatusHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        Ok(Reply::ok(json!({
            "tenant": ctx.param("tenantName"),
            "status": "ok",
        })))
    }
}

/// Blog tenant: change-logged posts plus a status route.
pub fn blog_tenant() -> DefinitionNode {
    DefinitionNode::new()
        .route("status", RouteDefinition::get(Arc::new(TenantStatus)))
        .child(
            "posts",
            resource_routes(
                "posts",
                ResourceOptions::new()
                    .schema(json!({
                        "type": "object",
                        "required": ["title"],
                        "properties": {
                            "title": { "type": "string" },
                            "body": { "type": "string" },
                        }
                    }))
                    .with_changelog(),
            ),
        )
}

/// Ecommerce tenant: a product catalog with a unique SKU index. Request
/// logging is disabled for the catalog subtree.
pub fn ecommerce_tenant() -> DefinitionNode {
    DefinitionNode::new().child(
        "products",
        resource_routes(
            "products",
            ResourceOptions::new()
                .index(IndexSpec::on(["sku"]).unique().named("idx_products_sku"))
                .schema(json!({
                    "type": "object",
                    "required": ["sku", "name"],
                    "properties": {
                        "sku": { "type": "string" },
                        "name": { "type": "string" },
                        "price": { "type": "number" },
                    }
                })),
        )
        .disable_hook(LifecycleStage::OnRequest, "logRequest"),
    )
}

/// The full demo tree: global hooks at the root, tenants below.
pub fn demo_tree(cache: &Arc<ResponseCache>, rules: &Arc<ControlRules>) -> DefinitionNode {
    DefinitionNode::new()
        .hook(
            LifecycleStage::OnRequest,
            "messageControl",
            Arc::new(MessageControl::new(rules.clone())),
        )
        .hook(
            LifecycleStage::OnRequest,
            "cacheOnRequest",
            Arc::new(CacheOnRequest::new(cache.clone())),
        )
        .hook(LifecycleStage::OnRequest, "logRequest", Arc::new(LogRequest))
        .hook(
            LifecycleStage::OnSend,
            "cacheOnSend",
            Arc::new(CacheOnSend::new(cache.clone())),
        )
        .child("blog", audit_module(blog_tenant()))
        .child("ecommerce", audit_module(ecommerce_tenant()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RouteCompiler;
    use crate::config::settings::{DynamicSettings, StaticSource};
    use crate::routing::TableRegistrar;
    use crate::storage::{DocumentStore, MemoryStore};
    use axum::http::Method;
    use std::collections::HashMap;
    use std::time::Duration;

    fn shared_state() -> (Arc<ResponseCache>, Arc<ControlRules>) {
        let settings = DynamicSettings::new(
            Box::new(StaticSource::new(HashMap::new())),
            Duration::from_secs(60),
        );
        (
            Arc::new(ResponseCache::new(Arc::new(settings))),
            Arc::new(ControlRules::new()),
        )
    }

    #[tokio::test]
    async fn test_demo_tree_compiles() {
        let (cache, rules) = shared_state();
        let store = Arc::new(MemoryStore::new());
        let compiler = RouteCompiler::new(store.clone());
        let mut registrar = TableRegistrar::root();

        let summary = compiler
            .compile(&mut registrar, &demo_tree(&cache, &rules))
            .await
            .unwrap();

        let table = registrar.table();
        assert!(table.contains(&Method::POST, "/blog/posts/create"));
        assert!(table.contains(&Method::GET, "/blog/posts/readById/{id}"));
        assert!(table.contains(&Method::GET, "/blog/status"));
        assert!(table.contains(&Method::PATCH, "/ecommerce/products/updateById/{id}"));
        assert!(table.contains(&Method::GET, "/blog/auditLogs/read"));
        assert!(table.contains(&Method::DELETE, "/ecommerce/auditLogs/bulk"));
        assert_eq!(summary.total_routes(), table.len());

        // collections provisioned during compilation
        let blog = store.namespace("blog").unwrap();
        assert!(blog.collection_exists("posts").await.unwrap());
        assert!(blog.collection_exists("posts_changelogs").await.unwrap());

        let shop = store.namespace("ecommerce").unwrap();
        let indexes = shop.list_indexes("products").await.unwrap();
        assert!(indexes.iter().any(|spec| spec.unique));
    }

    #[tokio::test]
    async fn test_products_subtree_disables_request_logging() {
        let (cache, rules) = shared_state();
        let store = Arc::new(MemoryStore::new());
        let compiler = RouteCompiler::new(store);
        let mut registrar = TableRegistrar::root();

        let summary = compiler
            .compile(&mut registrar, &demo_tree(&cache, &rules))
            .await
            .unwrap();

        let shop = summary.tenant("ecommerce").unwrap();
        for route in shop
            .routes
            .iter()
            .filter(|route| route.path.starts_with("/ecommerce/products"))
        {
            let on_request = &route.hooks[&LifecycleStage::OnRequest];
            assert!(!on_request.names.contains(&"logRequest".to_string()));
            assert!(on_request.names.contains(&"messageControl".to_string()));
        }

        let blog = summary.tenant("blog").unwrap();
        let status = blog
            .routes
            .iter()
            .find(|route| route.path == "/blog/status")
            .unwrap();
        assert!(status.hooks[&LifecycleStage::OnRequest]
            .names
            .contains(&"logRequest".to_string()));
    }
}
