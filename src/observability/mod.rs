//! Observability subsystem.
//!
//! Structured logging via `tracing`; HTTP spans come from the
//! `TraceLayer` wired in the server, correlation IDs from the
//! request-id middleware.

pub mod logging;

pub use logging::init_logging;
