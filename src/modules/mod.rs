//! Tenant route-tree modules.
//!
//! Everything here produces [`DefinitionNode`] trees for the compiler: the
//! generic resource factory and the demo tenants that exercise it.
//!
//! [`DefinitionNode`]: crate::compiler::DefinitionNode

pub mod audit;
pub mod resource;
pub mod tenants;

pub use audit::audit_module;
pub use resource::{resource_routes, ResourceOptions, ResourceRoute};
pub use tenants::demo_tree;
