//! Multi-tenant HTTP backend compiled from declarative route trees.
//!
//! # Architecture Overview
//!
//! ```text
//!   definition tree (modules/)            startup                per request
//!   ┌──────────────────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//!   │ tenants ─ groups ─ routes│──▶│ compiler (walker)│──▶│ http server (axum)   │
//!   │ hooks per nesting level  │   │  merge hook maps │   │  dispatch to route   │
//!   │ collection markers       │   │  provision store │   │  run hook pipeline   │
//!   └──────────────────────────┘   │  flatten chains  │   │  handler + storage   │
//!                                  └────────┬─────────┘   └──────────┬───────────┘
//!                                           │                        │
//!                                           ▼                        ▼
//!                                  ┌──────────────────┐   ┌──────────────────────┐
//!                                  │ route table +    │   │ storage namespaces   │
//!                                  │ compile summary  │   │ (per tenant)         │
//!                                  └──────────────────┘   └──────────────────────┘
//! ```
//!
//! Compilation happens once at startup; the resulting route table is
//! immutable. Runtime mutability is confined to the shared cache, control
//! rules, and dynamic settings objects consumed by hooks and the admin API.

// Core subsystems
pub mod compiler;
pub mod http;
pub mod pipeline;
pub mod routing;
pub mod storage;

// Route trees and shared hooks
pub mod hooks;
pub mod modules;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod observability;

pub use compiler::{CompileSummary, DefinitionNode, RouteCompiler};
pub use config::ServerConfig;
pub use http::{AppState, HttpServer};
pub use routing::{RouteTable, TableRegistrar};
