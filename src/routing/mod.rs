//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route compilation (at startup):
//!     DefinitionNode tree
//!     → compiler walker (merge hooks, resolve bindings)
//!     → registrar.rs (prefix scoping, pre-execution hook inheritance)
//!     → table.rs (flattened, immutable RouteTable)
//!
//! Request time:
//!     axum matches the compiled path → CompiledRoute → pipeline runner
//! ```
//!
//! # Design Decisions
//! - Routes compiled once at startup, immutable at runtime
//! - Registrar is a trait: the compiler never depends on axum directly
//! - Duplicate method+path registrations are rejected at compile time

pub mod registrar;
pub mod table;

pub use registrar::{Registrar, RouteRegistration, TableRegistrar};
pub use table::{collapse_slashes, join_paths, CompiledRoute, RouteTable};
