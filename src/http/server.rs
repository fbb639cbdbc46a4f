//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the axum Router from the compiled route table
//! - Wire up middleware (tracing, timeout, request ID, concurrency limit)
//! - Decode requests into pipeline contexts and run hook chains
//! - Mount the health endpoint and the admin API
//!
//! # Design Decisions
//! - One axum route per compiled route; axum owns path-pattern matching
//!   while the hook chains stay pre-flattened in the table
//! - The route table is immutable after startup; all runtime mutability
//!   lives in the shared cache/rules/settings objects

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, RawPathParams, State},
    http::{header::HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, on, MethodFilter},
    Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::compiler::CompileSummary;
use crate::config::{DynamicSettings, ServerConfig};
use crate::hooks::{ControlRules, ResponseCache};
use crate::pipeline::{run_route, Reply, RequestContext};
use crate::routing::{CompiledRoute, RouteTable};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Errors building or running the server.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("method '{0}' cannot be mounted")]
    UnsupportedMethod(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub summary: Arc<CompileSummary>,
    pub cache: Arc<ResponseCache>,
    pub rules: Arc<ControlRules>,
    pub settings: Arc<DynamicSettings>,
    pub config: Arc<ServerConfig>,
}

/// The compiled-route HTTP server.
pub struct HttpServer {
    router: Router,
    config: Arc<ServerConfig>,
}

impl HttpServer {
    /// Build a server over the compiled route table and shared runtime
    /// objects carried by `state`.
    pub fn new(state: AppState) -> Result<Self, ServeError> {
        let config = state.config.clone();
        let router = Self::build_router(&config, state)?;
        Ok(Self { router, config })
    }

    /// Build the axum router: compiled routes, health, admin, middleware.
    fn build_router(config: &Arc<ServerConfig>, state: AppState) -> Result<Router, ServeError> {
        let mut router = Router::new();

        for route in state.table.iter() {
            let filter = MethodFilter::try_from(route.method.clone())
                .map_err(|_| ServeError::UnsupportedMethod(route.method.to_string()))?;
            let compiled = Arc::new(route.clone());

            router = router.route(
                &route.path,
                on(filter, move |params: RawPathParams,
                                 Query(query): Query<HashMap<String, String>>,
                                 request: Request<Body>| {
                    dispatch(compiled.clone(), params, query, request)
                }),
            );
            tracing::debug!(method = %route.method, path = %route.path, "Route mounted");
        }

        router = router.route("/health", get(health_handler));
        if config.admin.enabled {
            router = router.nest("/admin", admin::setup_admin_router(state.clone()));
        }

        Ok(router
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http()))
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServeError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router itself, for in-process testing with `tower::ServiceExt`.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Decode the request, run the route's hook chain, encode the reply.
async fn dispatch(
    route: Arc<CompiledRoute>,
    params: RawPathParams,
    query: HashMap<String, String>,
    request: Request<Body>,
) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = request.uri().path().to_string();

    let mut ctx = RequestContext::new(route.method.clone(), path, route.path.clone());
    if let Some(id) = request_id {
        ctx.request_id = id;
    }
    for (name, value) in params.iter() {
        ctx.params.insert(name.to_string(), value.to_string());
    }
    ctx.query = query;

    match axum::body::to_bytes(request.into_body(), 1024 * 1024).await {
        Ok(bytes) if !bytes.is_empty() => match serde_json::from_slice(&bytes) {
            Ok(value) => ctx.body = Some(value),
            Err(err) => {
                tracing::debug!(request_id = %ctx.request_id, error = %err, "Malformed JSON body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "malformed JSON body" })),
                )
                    .into_response();
            }
        },
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(request_id = %ctx.request_id, error = %err, "Failed to read request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({ "error": "request body too large" })),
            )
                .into_response();
        }
    }

    let reply = run_route(&route, &mut ctx).await;
    into_response(reply)
}

/// Convert a pipeline reply into an axum response.
fn into_response(reply: Reply) -> Response {
    let mut response = if reply.status == StatusCode::NO_CONTENT {
        reply.status.into_response()
    } else {
        (reply.status, Json(reply.body)).into_response()
    };

    for (name, value) in &reply.headers {
        let parsed = (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => {
                tracing::warn!(header = %name, "Dropping unencodable response header");
            }
        }
    }
    response
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "routes": state.table.len(),
        "tenants": state.summary.tenants.len(),
    }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
