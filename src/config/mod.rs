//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! Dynamic tunables (cache TTL, max hits):
//!     settings.rs — TTL-cached snapshot over a SettingsSource,
//!     explicit invalidation, injected into the hooks that need it
//! ```
//!
//! # Design Decisions
//! - Static config is immutable once loaded; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, CacheConfig, ListenerConfig, ServerConfig, TimeoutConfig};
pub use settings::{DynamicSettings, SettingsSource, StaticSource};
