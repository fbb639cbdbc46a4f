//! Tenant audit-logging module.
//!
//! Applying this to a tenant tree attaches the payload-capture and audit
//! writer hooks to every route in the tenant and mounts management routes
//! for the audit collection itself. The management subtree disables the
//! inherited writer: reading the audit log must never grow it.

use std::sync::Arc;

use crate::compiler::{DefinitionNode, LifecycleStage};
use crate::hooks::audit::{AuditLogger, CapturePayload, AUDIT_COLLECTION};
use crate::modules::resource::{resource_routes, ResourceOptions, ResourceRoute};

/// Attach audit logging to a tenant tree.
pub fn audit_module(tenant: DefinitionNode) -> DefinitionNode {
    tenant
        .hook(
            LifecycleStage::OnSend,
            "capturePayload",
            Arc::new(CapturePayload),
        )
        .hook(
            LifecycleStage::OnResponse,
            "auditLogger",
            Arc::new(AuditLogger),
        )
        .child(
            AUDIT_COLLECTION,
            resource_routes(
                AUDIT_COLLECTION,
                ResourceOptions::new().enable([
                    ResourceRoute::Read,
                    ResourceRoute::ReadBulk,
                    ResourceRoute::ReadById,
                    ResourceRoute::DeleteById,
                    ResourceRoute::DeleteBulk,
                ]),
            )
            .disable_hook(LifecycleStage::OnResponse, "auditLogger"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{RouteCompiler, RouteDefinition};
    use crate::pipeline::{HookError, Reply, RequestContext, RouteHandler};
    use crate::routing::TableRegistrar;
    use crate::storage::{DocumentStore, MemoryStore};
    use async_trait::async_trait;
    use axum::http::Method;
    use serde_json::json;

    struct Ping;

    #[async_trait]
    impl RouteHandler for Ping {
        async fn handle(&self, _ctx: &mut RequestContext) -> Result<Reply, HookError> {
            Ok(Reply::ok(json!({"pong": true})))
        }
    }

    #[tokio::test]
    async fn test_audit_module_mounts_management_routes() {
        let tenant = audit_module(
            DefinitionNode::new().route("ping", RouteDefinition::get(Arc::new(Ping))),
        );
        let tree = DefinitionNode::new().child("acme", tenant);

        let store = Arc::new(MemoryStore::new());
        let compiler = RouteCompiler::new(store.clone());
        let mut registrar = TableRegistrar::root();
        compiler.compile(&mut registrar, &tree).await.unwrap();

        let table = registrar.table();
        assert!(table.contains(&Method::GET, "/acme/auditLogs/read"));
        assert!(table.contains(&Method::POST, "/acme/auditLogs/query"));
        assert!(table.contains(&Method::DELETE, "/acme/auditLogs/bulk"));

        // collection provisioned during compilation
        let ns = store.namespace("acme").unwrap();
        assert!(ns.collection_exists(AUDIT_COLLECTION).await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_writer_disabled_on_its_own_routes() {
        let tenant = audit_module(
            DefinitionNode::new().route("ping", RouteDefinition::get(Arc::new(Ping))),
        );
        let tree = DefinitionNode::new().child("acme", tenant);

        let compiler = RouteCompiler::new(Arc::new(MemoryStore::new()));
        let mut registrar = TableRegistrar::root();
        let summary = compiler.compile(&mut registrar, &tree).await.unwrap();

        let acme = summary.tenant("acme").unwrap();
        for route in &acme.routes {
            let on_response = &route.hooks[&LifecycleStage::OnResponse];
            let audited = on_response.names.contains(&"auditLogger".to_string());
            if route.path.starts_with("/acme/auditLogs") {
                assert!(!audited, "{} must not be audited", route.path);
            } else {
                assert!(audited, "{} must be audited", route.path);
            }
        }
    }
}
