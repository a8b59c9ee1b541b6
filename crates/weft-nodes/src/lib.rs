//! Built-in nodes.
//!
//! Hosts register these explicitly at startup: `register_universal_nodes`
//! goes into every host, `register_server_nodes` adds the rich-I/O set. Each
//! node module exposes a plain constructor; there is no reflective
//! registration.

mod delay;
mod empty;
mod http_request;
mod log;
mod r#while;

use std::sync::Arc;

pub use delay::DelayNode;
pub use empty::EmptyNode;
pub use http_request::HttpRequestNode;
pub use log::LogNode;
pub use r#while::WhileNode;

use weft_registry::{NodeRegistry, NodeScope, RegistryError};

/// Register the nodes available to every host.
pub fn register_universal_nodes(registry: &NodeRegistry) -> Result<usize, RegistryError> {
  registry.discover(
    NodeScope::Universal,
    vec![
      Arc::new(WhileNode::new()),
      Arc::new(LogNode::new()),
      Arc::new(EmptyNode::new()),
      Arc::new(DelayNode::new()),
    ],
  )
}

/// Register the server-only nodes.
pub fn register_server_nodes(registry: &NodeRegistry) -> Result<usize, RegistryError> {
  registry.discover(NodeScope::Server, vec![Arc::new(HttpRequestNode::new())])
}
