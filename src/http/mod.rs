//! HTTP server subsystem.
//!
//! Turns the compiled route table into a running axum service: one axum
//! route per compiled route, plus the health endpoint and the admin API.

pub mod server;

pub use server::{AppState, HttpServer, ServeError};
