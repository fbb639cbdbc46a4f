use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::compiler::CompileSummary;
use crate::hooks::ControlRule;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub tenants: usize,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub paths: Vec<CacheEntryStatus>,
    pub settings: std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
pub struct CacheEntryStatus {
    pub path: String,
    pub hits: u32,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: state.table.len(),
        tenants: state.summary.tenants.len(),
    })
}

/// The full compile summary, as structured JSON.
pub async fn get_routes(State(state): State<AppState>) -> Json<CompileSummary> {
    Json(state.summary.as_ref().clone())
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStatus> {
    let paths = state
        .cache
        .snapshot()
        .into_iter()
        .map(|(path, hits)| CacheEntryStatus { path, hits })
        .collect::<Vec<_>>();
    Json(CacheStatus {
        entries: paths.len(),
        paths,
        settings: state.settings.all().await,
    })
}

pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.clear();
    tracing::info!("Response cache cleared by admin");
    StatusCode::NO_CONTENT
}

/// Drop the dynamic-settings snapshot so the next read refetches.
pub async fn refresh_settings(State(state): State<AppState>) -> StatusCode {
    state.settings.invalidate();
    tracing::info!("Dynamic settings invalidated by admin");
    StatusCode::NO_CONTENT
}

pub async fn get_control(State(state): State<AppState>) -> Json<Vec<ControlRule>> {
    Json(state.rules.snapshot())
}

pub async fn set_control(
    State(state): State<AppState>,
    Json(rule): Json<ControlRule>,
) -> StatusCode {
    tracing::info!(path = %rule.path, "Control rule set by admin");
    state.rules.set(rule);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct ControlSelector {
    pub path: String,
}

pub async fn remove_control(
    State(state): State<AppState>,
    Query(selector): Query<ControlSelector>,
) -> StatusCode {
    if state.rules.remove(&selector.path) {
        tracing::info!(path = %selector.path, "Control rule removed by admin");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
