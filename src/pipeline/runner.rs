//! Per-request chain execution.
//!
//! # Execution order
//! pre-execution hooks → onRequest → preParsing → preValidation →
//! preHandler → handler → preSerialization → onSend → onResponse.
//!
//! A hook replying early skips the remaining pre-handler stages and the
//! handler; onSend/onResponse still run. Errors run the onError hooks and
//! produce a 500. onTimeout/onRequestAbort are compiled into the table but
//! triggered by the host framework, not by this runner.

use axum::http::StatusCode;
use serde_json::json;

use crate::compiler::lifecycle::LifecycleStage;
use crate::pipeline::context::{Reply, RequestContext};
use crate::pipeline::hook::{HookError, HookFlow};
use crate::routing::CompiledRoute;

const PRE_HANDLER_STAGES: [LifecycleStage; 4] = [
    LifecycleStage::OnRequest,
    LifecycleStage::PreParsing,
    LifecycleStage::PreValidation,
    LifecycleStage::PreHandler,
];

const POST_HANDLER_STAGES: [LifecycleStage; 3] = [
    LifecycleStage::PreSerialization,
    LifecycleStage::OnSend,
    LifecycleStage::OnResponse,
];

/// Run a compiled route's full chain and produce the reply.
pub async fn run_route(route: &CompiledRoute, ctx: &mut RequestContext) -> Reply {
    match run_chain(route, ctx).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::error!(
                request_id = %ctx.request_id,
                method = %ctx.method,
                path = %ctx.path,
                error = %err,
                "Request chain failed"
            );
            run_error_hooks(route, ctx).await;
            error_reply(&err)
        }
    }
}

async fn run_chain(route: &CompiledRoute, ctx: &mut RequestContext) -> Result<Reply, HookError> {
    for hook in &route.pre_execution {
        if let HookFlow::Respond(reply) = hook.run(ctx).await? {
            ctx.reply = Some(reply);
            return finish(route, ctx).await;
        }
    }

    for stage in PRE_HANDLER_STAGES {
        for hook in route.stage_hooks(stage) {
            if let HookFlow::Respond(reply) = hook.run(ctx).await? {
                ctx.reply = Some(reply);
                return finish(route, ctx).await;
            }
        }
    }

    let reply = route.handler.handle(ctx).await?;
    ctx.reply = Some(reply);
    finish(route, ctx).await
}

/// Run the response stages over `ctx.reply` and hand the reply out.
async fn finish(route: &CompiledRoute, ctx: &mut RequestContext) -> Result<Reply, HookError> {
    for stage in POST_HANDLER_STAGES {
        for hook in route.stage_hooks(stage) {
            if let HookFlow::Respond(reply) = hook.run(ctx).await? {
                ctx.reply = Some(reply);
            }
        }
    }
    let mut reply = ctx.reply.take().unwrap_or_else(|| {
        Reply::new(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "no reply produced"}))
    });
    reply.headers.extend(ctx.response_headers.drain(..));
    Ok(reply)
}

async fn run_error_hooks(route: &CompiledRoute, ctx: &mut RequestContext) {
    for hook in route.stage_hooks(LifecycleStage::OnError) {
        if let Err(err) = hook.run(ctx).await {
            tracing::error!(
                request_id = %ctx.request_id,
                error = %err,
                "onError hook failed"
            );
        }
    }
}

fn error_reply(err: &HookError) -> Reply {
    let status = match err {
        HookError::BadRequest(_) => StatusCode::BAD_REQUEST,
        HookError::Storage(crate::storage::StorageError::UniqueViolation { .. }) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Reply::new(status, json!({"error": err.to_string()}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::hook::{HookFn, RequestHook, RouteHandler};
    use async_trait::async_trait;
    use axum::http::Method;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct Trace {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RequestHook for Trace {
        async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
            self.log.lock().unwrap().push(self.label);
            Ok(HookFlow::Continue)
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl RequestHook for ShortCircuit {
        async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
            Ok(HookFlow::Respond(Reply::new(
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"message": "disabled"}),
            )))
        }
    }

    struct Handler {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl RouteHandler for Handler {
        fn name(&self) -> &str {
            "traceHandler"
        }

        async fn handle(&self, _ctx: &mut RequestContext) -> Result<Reply, HookError> {
            self.log.lock().unwrap().push("handler");
            Ok(Reply::ok(json!({"ok": true})))
        }
    }

    fn trace(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> HookFn {
        Arc::new(Trace {
            label,
            log: log.clone(),
        })
    }

    fn route(
        log: &Arc<Mutex<Vec<&'static str>>>,
        stages: BTreeMap<LifecycleStage, Vec<HookFn>>,
        pre_execution: Vec<HookFn>,
    ) -> CompiledRoute {
        CompiledRoute {
            method: Method::GET,
            path: "/t/r".to_string(),
            handler_name: "traceHandler".to_string(),
            handler: Arc::new(Handler { log: log.clone() }),
            pre_execution,
            stages,
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_canonical_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stages = BTreeMap::new();
        stages.insert(LifecycleStage::OnSend, vec![trace("onSend", &log)]);
        stages.insert(LifecycleStage::OnRequest, vec![trace("onRequest", &log)]);
        stages.insert(LifecycleStage::PreHandler, vec![trace("preHandler", &log)]);
        let route = route(&log, stages, vec![trace("pre", &log)]);

        let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
        let reply = run_route(&route, &mut ctx).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre", "onRequest", "preHandler", "handler", "onSend"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler_but_runs_response_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stages = BTreeMap::new();
        stages.insert(
            LifecycleStage::OnRequest,
            vec![Arc::new(ShortCircuit) as HookFn],
        );
        stages.insert(LifecycleStage::PreHandler, vec![trace("preHandler", &log)]);
        stages.insert(LifecycleStage::OnResponse, vec![trace("onResponse", &log)]);
        let route = route(&log, stages, vec![]);

        let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
        let reply = run_route(&route, &mut ctx).await;

        assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(*log.lock().unwrap(), vec!["onResponse"]);
    }

    #[tokio::test]
    async fn test_hook_error_maps_to_error_reply() {
        struct Failing;

        #[async_trait]
        impl RequestHook for Failing {
            async fn run(&self, _ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
                Err(HookError::BadRequest("body required".to_string()))
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stages = BTreeMap::new();
        stages.insert(LifecycleStage::PreHandler, vec![Arc::new(Failing) as HookFn]);
        stages.insert(LifecycleStage::OnError, vec![trace("onError", &log)]);
        let route = route(&log, stages, vec![]);

        let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
        let reply = run_route(&route, &mut ctx).await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(*log.lock().unwrap(), vec!["onError"]);
    }

    #[tokio::test]
    async fn test_hook_headers_attached_to_reply() {
        struct Header;

        #[async_trait]
        impl RequestHook for Header {
            async fn run(&self, ctx: &mut RequestContext) -> Result<HookFlow, HookError> {
                ctx.add_header("X-Cache", "MISS");
                Ok(HookFlow::Continue)
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stages = BTreeMap::new();
        stages.insert(LifecycleStage::OnRequest, vec![Arc::new(Header) as HookFn]);
        let route = route(&log, stages, vec![]);

        let mut ctx = RequestContext::new(Method::GET, "/t/r", "/t/r");
        let reply = run_route(&route, &mut ctx).await;
        assert!(reply
            .headers
            .iter()
            .any(|(name, value)| name == "X-Cache" && value == "MISS"));
    }
}
