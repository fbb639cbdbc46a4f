//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins when set; the configured filter is the fallback
//! - Initialized once at startup, before any other subsystem logs

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the configured default filter.
pub fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
