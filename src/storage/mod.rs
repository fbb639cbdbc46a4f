//! Document storage subsystem.
//!
//! # Data Flow
//! ```text
//! Route compilation (startup):
//!     tenant key → DocumentStore (ensure namespace)
//!     collection marker → resolver.rs (ensure doc/edge/changelog + indexes)
//!     → ResourceBinding injected into the request pipeline
//!
//! Request time:
//!     handlers and hooks use the injected CollectionRef handles
//! ```
//!
//! # Design Decisions
//! - The store is consumed through traits; the backing database is a
//!   collaborator, not part of this crate
//! - Provisioning is one-shot and fail-fast; no retries
//! - The in-memory store backs the demo binary and the test suite

pub mod interface;
pub mod memory;
pub mod resolver;

pub use interface::{
    CollectionKind, CollectionRef, DocumentStore, IndexSpec, StorageError, StorageNamespace,
};
pub use memory::MemoryStore;
pub use resolver::{changelog_collection_name, edge_collection_name, resolve, ResourceBinding};
