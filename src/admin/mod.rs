pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Admin API, mounted under `/admin` behind bearer-key auth.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/routes", get(get_routes))
        .route("/cache", get(get_cache).delete(clear_cache))
        .route("/settings/refresh", post(refresh_settings))
        .route(
            "/control",
            get(get_control).post(set_control).delete(remove_control),
        )
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
