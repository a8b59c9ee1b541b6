//! The node registry.
//!
//! Nodes register under one of three scopes: `universal` nodes are visible
//! to both hosts, `server` and `client` nodes only to theirs. The registry
//! is initialised once per process — discovery is a one-shot bulk
//! registration from a host-provided list — and is read-mostly afterwards,
//! so lookups take a read lock and are O(1).

mod registry;
mod scope;

pub use registry::{NodeRegistry, RegistryError};
pub use scope::NodeScope;
