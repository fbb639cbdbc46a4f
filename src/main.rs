//! Server entry point: load config, compile the demo route tree, serve.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use trellis::config::settings::{keys, DynamicSettings, StaticSource};
use trellis::config::{load_config, ServerConfig};
use trellis::hooks::{ControlRules, ResponseCache};
use trellis::http::{AppState, HttpServer};
use trellis::modules::demo_tree;
use trellis::observability::init_logging;
use trellis::routing::TableRegistrar;
use trellis::storage::MemoryStore;
use trellis::RouteCompiler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional config path as the first argument; defaults otherwise.
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => ServerConfig::default(),
    };

    init_logging(&config.observability.log_filter);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    // Shared runtime objects consumed by hooks and the admin API.
    let settings = Arc::new(DynamicSettings::new(
        Box::new(StaticSource::new(HashMap::from([
            (
                keys::CACHE_TTL_SECONDS.to_string(),
                config.cache.ttl_secs.to_string(),
            ),
            (
                keys::CACHE_MAX_HITS.to_string(),
                config.cache.max_hits.to_string(),
            ),
        ]))),
        Duration::from_millis(config.cache.settings_refresh_ms),
    ));
    let cache = Arc::new(ResponseCache::new(settings.clone()));
    let rules = Arc::new(ControlRules::new());

    // Compile the route tree. Any failure here aborts startup.
    let store = Arc::new(MemoryStore::new());
    let compiler = RouteCompiler::new(store);
    let mut registrar = TableRegistrar::root();
    let summary = compiler
        .compile(&mut registrar, &demo_tree(&cache, &rules))
        .await?;
    let table = registrar.table();

    tracing::info!(routes = table.len(), "Route compilation complete");
    tracing::info!("{summary}");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState {
        table: Arc::new(table),
        summary: Arc::new(summary),
        cache,
        rules,
        settings,
        config: Arc::new(config),
    };
    HttpServer::new(state)?.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
