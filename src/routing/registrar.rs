//! Route registration interface.
//!
//! # Responsibilities
//! - Accept route registrations from the compiler
//! - Scope registrations under nested path prefixes
//! - Carry pre-execution hooks down into sub-namespaces
//!
//! # Design Decisions
//! - Trait seam so the compiler is framework-agnostic and tests can record
//! - Sub-namespaces inherit their parent's pre-execution hooks at creation
//!   time; hooks added afterwards apply only to later sub-namespaces
//! - Registering the same method+path twice is a structural error

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::http::Method;

use crate::compiler::lifecycle::LifecycleStage;
use crate::compiler::CompileError;
use crate::pipeline::{HookFn, RouteHandler};
use crate::routing::table::{join_paths, CompiledRoute, RouteTable};

/// A single route handed to the registrar by the compiler.
pub struct RouteRegistration {
    pub method: Method,

    /// Path relative to the registrar's prefix, already slash-normalized by
    /// the caller or not; the registrar normalizes again.
    pub path: String,

    pub handler: Arc<dyn RouteHandler>,

    /// Flattened active hooks per stage, in final merge order.
    pub stages: BTreeMap<LifecycleStage, Vec<HookFn>>,
}

/// Registration surface consumed by the route compiler.
pub trait Registrar: Send {
    /// The absolute path prefix this registrar is scoped to (`""` at root).
    fn prefix(&self) -> &str;

    /// Register a route. Returns the full normalized path.
    fn register(&mut self, registration: RouteRegistration) -> Result<String, CompileError>;

    /// A registrar scoped one path segment deeper.
    fn create_sub_namespace(&mut self, segment: &str) -> Box<dyn Registrar>;

    /// Add a hook that runs before every route registered under this
    /// namespace (and namespaces created from it afterwards).
    fn add_pre_execution_hook(&mut self, hook: HookFn);
}

/// Registrar that accumulates into a shared [`RouteTable`].
pub struct TableRegistrar {
    prefix: String,
    pre_execution: Vec<HookFn>,
    table: Arc<Mutex<RouteTable>>,
}

impl TableRegistrar {
    /// Root registrar with an empty table.
    pub fn root() -> Self {
        Self {
            prefix: String::new(),
            pre_execution: Vec::new(),
            table: Arc::new(Mutex::new(RouteTable::new())),
        }
    }

    /// Snapshot of the accumulated table.
    pub fn table(&self) -> RouteTable {
        self.table.lock().expect("route table lock").clone()
    }
}

impl Registrar for TableRegistrar {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn register(&mut self, registration: RouteRegistration) -> Result<String, CompileError> {
        let full_path = join_paths(&self.prefix, &registration.path);
        let mut table = self.table.lock().expect("route table lock");

        if table.contains(&registration.method, &full_path) {
            return Err(CompileError::Registration {
                path: full_path,
                reason: format!("duplicate {} registration", registration.method),
            });
        }

        tracing::debug!(
            method = %registration.method,
            path = %full_path,
            pre_execution = self.pre_execution.len(),
            "Route registered"
        );

        table.push(CompiledRoute {
            method: registration.method,
            path: full_path.clone(),
            handler_name: registration.handler.name().to_string(),
            handler: registration.handler,
            pre_execution: self.pre_execution.clone(),
            stages: registration.stages,
        });
        Ok(full_path)
    }

    fn create_sub_namespace(&mut self, segment: &str) -> Box<dyn Registrar> {
        Box::new(TableRegistrar {
            prefix: join_paths(&self.prefix, segment),
            pre_execution: self.pre_execution.clone(),
            table: Arc::clone(&self.table),
        })
    }

    fn add_pre_execution_hook(&mut self, hook: HookFn) {
        self.pre_execution.push(hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{HookError, HookFlow, Reply, RequestContext, RequestHook};
    use async_trait::async_trait;

    struct Stub;

    #[async_trait]
    impl crate::pipeline::RouteHandler for Stub {
        fn name(&self) -> &str {
            "stubHandler"
        }

        async fn handle(&self, _ctx: &mut RequestContext) -> Result<Reply, HookError> {
            Ok(Reply::ok(serde_json::Value::Null))
        }
    }

    struct NoopHook;

    #[async_trait]
    impl RequestHook for NoopHook {
        async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
            Ok(HookFlow::Continue)
        }
    }

    fn registration(method: Method, path: &str) -> RouteRegistration {
        RouteRegistration {
            method,
            path: path.to_string(),
            handler: Arc::new(Stub),
            stages: BTreeMap::new(),
        }
    }

    #[test]
    fn test_nested_prefixes_compose() {
        let mut root = TableRegistrar::root();
        let mut tenant = root.create_sub_namespace("blog");
        let mut group = tenant.create_sub_namespace("posts");

        let full = group.register(registration(Method::GET, "/latest")).unwrap();
        assert_eq!(full, "/blog/posts/latest");
        assert!(root.table().contains(&Method::GET, "/blog/posts/latest"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut root = TableRegistrar::root();
        root.register(registration(Method::GET, "/a")).unwrap();
        let err = root.register(registration(Method::GET, "/a")).unwrap_err();
        assert!(matches!(err, CompileError::Registration { .. }));
        // same path, different method is fine
        root.register(registration(Method::POST, "/a")).unwrap();
    }

    #[test]
    fn test_pre_execution_hooks_inherited_by_later_namespaces_only() {
        let mut root = TableRegistrar::root();
        let mut early = root.create_sub_namespace("early");
        root.add_pre_execution_hook(Arc::new(NoopHook));
        let mut late = root.create_sub_namespace("late");

        early.register(registration(Method::GET, "/r")).unwrap();
        late.register(registration(Method::GET, "/r")).unwrap();

        let table = root.table();
        assert_eq!(
            table
                .find(&Method::GET, "/early/r")
                .unwrap()
                .pre_execution
                .len(),
            0
        );
        assert_eq!(
            table
                .find(&Method::GET, "/late/r")
                .unwrap()
                .pre_execution
                .len(),
            1
        );
    }
}
