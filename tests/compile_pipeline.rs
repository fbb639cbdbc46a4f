//! End-to-end tests for tree compilation and the request pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{json, Value};

use trellis::compiler::{
    CollectionSpec, CompileError, DefinitionNode, LifecycleStage, RouteCompiler, RouteDefinition,
};
use trellis::pipeline::{
    run_route, HookError, HookFlow, Reply, RequestContext, RequestHook, RouteHandler,
};
use trellis::routing::TableRegistrar;
use trellis::storage::{DocumentStore, IndexSpec, MemoryStore};

/// Hook that appends its label to a shared trace.
struct TraceHook {
    label: &'static str,
    trace: Arc<Mutex<Vec<String>>>,
}

impl TraceHook {
    fn new(label: &'static str, trace: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            label,
            trace: trace.clone(),
        })
    }
}

#[async_trait]
impl RequestHook for TraceHook {
    async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
        self.trace.lock().unwrap().push(self.label.to_string());
        Ok(HookFlow::Continue)
    }
}

struct EchoHandler;

#[async_trait]
impl RouteHandler for EchoHandler {
    fn name(&self) -> &str {
        "echoHandler"
    }

    async fn handle(&self, ctx: &mut RequestContext) -> Result<Reply, HookError> {
        Ok(Reply::ok(json!({
            "tenant": ctx.param("tenantName"),
            "path": ctx.path,
        })))
    }
}

async fn compile(
    tree: &DefinitionNode,
    store: &Arc<MemoryStore>,
) -> (TableRegistrar, trellis::CompileSummary) {
    let compiler = RouteCompiler::new(store.clone());
    let mut registrar = TableRegistrar::root();
    let summary = compiler.compile(&mut registrar, tree).await.unwrap();
    (registrar, summary)
}

#[tokio::test]
async fn test_path_composition() {
    let tree = DefinitionNode::new().child(
        "t",
        DefinitionNode::new().child(
            "g",
            DefinitionNode::new().route("r", RouteDefinition::get(Arc::new(EchoHandler))),
        ),
    );

    let store = Arc::new(MemoryStore::new());
    let (registrar, summary) = compile(&tree, &store).await;

    let table = registrar.table();
    assert_eq!(table.len(), 1);
    assert!(table.contains(&Method::GET, "/t/g/r"));
    assert_eq!(summary.tenant("t").unwrap().routes[0].path, "/t/g/r");
}

#[tokio::test]
async fn test_hook_order_and_override_across_levels() {
    let trace = Arc::new(Mutex::new(Vec::new()));

    // Root declares A then B; the route overrides A in place and adds C.
    let tree = DefinitionNode::new()
        .hook(LifecycleStage::OnRequest, "A", TraceHook::new("root-A", &trace))
        .hook(LifecycleStage::OnRequest, "B", TraceHook::new("root-B", &trace))
        .child(
            "t",
            DefinitionNode::new().route(
                "r",
                RouteDefinition::get(Arc::new(EchoHandler))
                    .hook(LifecycleStage::OnRequest, "A", TraceHook::new("route-A", &trace))
                    .hook(LifecycleStage::OnRequest, "C", TraceHook::new("route-C", &trace)),
            ),
        );

    let store = Arc::new(MemoryStore::new());
    let (registrar, _) = compile(&tree, &store).await;
    let table = registrar.table();
    let route = table.find(&Method::GET, "/t/r").unwrap();

    let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
    let reply = run_route(route, &mut ctx).await;
    assert_eq!(reply.status, axum::http::StatusCode::OK);

    // Override keeps A's original position: A (replaced), B, C.
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["route-A", "root-B", "route-C"]
    );
}

#[tokio::test]
async fn test_disable_excludes_hook_from_chain() {
    let trace = Arc::new(Mutex::new(Vec::new()));

    let tree = DefinitionNode::new()
        .hook(LifecycleStage::OnRequest, "A", TraceHook::new("A", &trace))
        .hook(LifecycleStage::OnRequest, "B", TraceHook::new("B", &trace))
        .child(
            "t",
            DefinitionNode::new()
                .disable_hook(LifecycleStage::OnRequest, "A")
                .route("r", RouteDefinition::get(Arc::new(EchoHandler))),
        );

    let store = Arc::new(MemoryStore::new());
    let (registrar, summary) = compile(&tree, &store).await;
    let table = registrar.table();
    let route = table.find(&Method::GET, "/t/r").unwrap();

    assert_eq!(route.stage_hooks(LifecycleStage::OnRequest).len(), 1);

    let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
    run_route(route, &mut ctx).await;
    assert_eq!(*trace.lock().unwrap(), vec!["B"]);

    // the summary reflects only the active hook
    let info = &summary.tenant("t").unwrap().routes[0].hooks[&LifecycleStage::OnRequest];
    assert_eq!(info.count, 1);
    assert_eq!(info.names, vec!["B"]);
}

#[tokio::test]
async fn test_tenant_context_injected_by_pre_execution_hook() {
    let tree = DefinitionNode::new().child(
        "blog",
        DefinitionNode::new().route("whoami", RouteDefinition::get(Arc::new(EchoHandler))),
    );

    let store = Arc::new(MemoryStore::new());
    let (registrar, _) = compile(&tree, &store).await;
    let table = registrar.table();
    let route = table.find(&Method::GET, "/blog/whoami").unwrap();

    let mut ctx = RequestContext::new(Method::GET, "/blog/whoami", "/blog/whoami");
    let reply = run_route(route, &mut ctx).await;
    assert_eq!(reply.body["tenant"], "blog");
    assert!(store.namespace("blog").is_ok());
}

#[tokio::test]
async fn test_collection_marker_provisions_storage() {
    let tree = DefinitionNode::new().child(
        "shop",
        DefinitionNode::new().child(
            "items",
            DefinitionNode::new()
                .collection(
                    CollectionSpec::new()
                        .index(IndexSpec::on(["sku"]).unique())
                        .with_changelog(),
                )
                .route("read", RouteDefinition::get(Arc::new(EchoHandler))),
        ),
    );

    let store = Arc::new(MemoryStore::new());
    compile(&tree, &store).await;

    let ns = store.namespace("shop").unwrap();
    assert!(ns.collection_exists("items").await.unwrap());
    assert!(ns.collection_exists("items_edge").await.unwrap());
    assert!(ns.collection_exists("items_changelogs").await.unwrap());
    assert_eq!(ns.list_indexes("items").await.unwrap().len(), 1);

    // recompiling against the same store must not duplicate indexes
    compile(&tree, &store).await;
    assert_eq!(ns.list_indexes("items").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_short_circuit_skips_handler_but_runs_post_stages() {
    struct Refuse;

    #[async_trait]
    impl RequestHook for Refuse {
        async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
            Ok(HookFlow::Respond(Reply::new(
                axum::http::StatusCode::FORBIDDEN,
                json!({"error": "refused"}),
            )))
        }
    }

    let trace = Arc::new(Mutex::new(Vec::new()));
    let tree = DefinitionNode::new().child(
        "t",
        DefinitionNode::new().route(
            "r",
            RouteDefinition::get(Arc::new(EchoHandler))
                .hook(LifecycleStage::PreHandler, "refuse", Arc::new(Refuse))
                .hook(
                    LifecycleStage::OnResponse,
                    "after",
                    TraceHook::new("after", &trace),
                ),
        ),
    );

    let store = Arc::new(MemoryStore::new());
    let (registrar, _) = compile(&tree, &store).await;
    let table = registrar.table();
    let route = table.find(&Method::GET, "/t/r").unwrap();

    let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
    let reply = run_route(route, &mut ctx).await;

    assert_eq!(reply.status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(*trace.lock().unwrap(), vec!["after"]);
}

#[tokio::test]
async fn test_reserved_keys_and_stray_values_skipped() {
    // A route at tenant level is ignored with a warning; lifecycle-named
    // keys never become path segments.
    let tree = DefinitionNode::new()
        .route("stray", RouteDefinition::get(Arc::new(EchoHandler)))
        .child(
            "t",
            DefinitionNode::new()
                .child("onRequest", DefinitionNode::new())
                .route("r", RouteDefinition::get(Arc::new(EchoHandler))),
        );

    let store = Arc::new(MemoryStore::new());
    let (registrar, summary) = compile(&tree, &store).await;
    let table = registrar.table();

    assert_eq!(table.len(), 1);
    assert!(table.contains(&Method::GET, "/t/r"));
    assert!(summary.tenant("stray").is_none());
}

#[tokio::test]
async fn test_duplicate_route_is_a_compile_error() {
    let tree = DefinitionNode::new().child(
        "t",
        DefinitionNode::new()
            .child(
                "a",
                DefinitionNode::new().route("r", RouteDefinition::get(Arc::new(EchoHandler))),
            )
            .route("a/r", RouteDefinition::get(Arc::new(EchoHandler))),
    );

    let store = Arc::new(MemoryStore::new());
    let compiler = RouteCompiler::new(store);
    let mut registrar = TableRegistrar::root();
    let err = compiler.compile(&mut registrar, &tree).await.unwrap_err();
    assert!(matches!(err, CompileError::Registration { .. }));
}

#[tokio::test]
async fn test_summary_counts_match_merged_hooks() {
    let noop: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let tree = DefinitionNode::new()
        .hook(LifecycleStage::OnRequest, "global", TraceHook::new("g", &noop))
        .child(
            "t",
            DefinitionNode::new()
                .route("one", RouteDefinition::get(Arc::new(EchoHandler)))
                .route(
                    "two",
                    RouteDefinition::post(Arc::new(EchoHandler)).hook(
                        LifecycleStage::PreHandler,
                        "extra",
                        TraceHook::new("e", &noop),
                    ),
                ),
        );

    let store = Arc::new(MemoryStore::new());
    let (_, summary) = compile(&tree, &store).await;

    let tenant = summary.tenant("t").unwrap();
    assert_eq!(tenant.routes.len(), 2);

    let one = &tenant.routes[0];
    assert_eq!(one.hooks[&LifecycleStage::OnRequest].count, 1);
    assert_eq!(one.hooks[&LifecycleStage::PreHandler].count, 0);

    let two = &tenant.routes[1];
    assert_eq!(two.hooks[&LifecycleStage::OnRequest].count, 1);
    assert_eq!(two.hooks[&LifecycleStage::PreHandler].count, 1);

    let rendered = summary.to_string();
    assert!(rendered.contains("Tenant: t (2 routes)"));
    assert!(rendered.contains("onRequest: [global]"));
}

#[tokio::test]
async fn test_schema_passthrough_deep_merges() {
    // Compiles cleanly with pass-through config present; the schema does not
    // interfere with hooks or paths.
    let tree = DefinitionNode::new().child(
        "t",
        DefinitionNode::new().route(
            "r",
            RouteDefinition::post(Arc::new(EchoHandler))
                .schema(json!({"body": {"type": "object"}}))
                .config("cache", Value::Bool(false)),
        ),
    );

    let store = Arc::new(MemoryStore::new());
    let (registrar, _) = compile(&tree, &store).await;
    assert!(registrar.table().contains(&Method::POST, "/t/r"));
}

#[tokio::test]
async fn test_tenant_isolation_between_namespaces() {
    let tree = DefinitionNode::new()
        .child(
            "alpha",
            DefinitionNode::new().child(
                "notes",
                DefinitionNode::new()
                    .collection(CollectionSpec::new())
                    .route("read", RouteDefinition::get(Arc::new(EchoHandler))),
            ),
        )
        .child(
            "beta",
            DefinitionNode::new().route("ping", RouteDefinition::get(Arc::new(EchoHandler))),
        );

    let store = Arc::new(MemoryStore::new());
    compile(&tree, &store).await;

    assert!(store
        .namespace("alpha")
        .unwrap()
        .collection_exists("notes")
        .await
        .unwrap());
    assert!(!store
        .namespace("beta")
        .unwrap()
        .collection_exists("notes")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_compile_summary_total() {
    let tree = DefinitionNode::new().child(
        "t",
        DefinitionNode::new()
            .route("a", RouteDefinition::get(Arc::new(EchoHandler)))
            .route("b", RouteDefinition::get(Arc::new(EchoHandler))),
    );
    let store = Arc::new(MemoryStore::new());
    let (registrar, summary) = compile(&tree, &store).await;
    assert_eq!(summary.total_routes(), registrar.table().len());
}
