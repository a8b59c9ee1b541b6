//! The node contract.
//!
//! A node is a named, versioned unit of work. It declares immutable
//! [`NodeMetadata`], optionally validates its config, and executes against an
//! [`ExecutionContext`] to produce an [`EdgeMap`]: exactly one outgoing edge
//! label paired with a deferred data producer.
//!
//! Nodes hold no per-execution mutable state; anything run-scoped goes
//! through `ctx.state`. A single node instance may be executed concurrently
//! for different executions.

mod context;
mod edge;
mod metadata;
mod node;
mod runtime;

pub use context::ExecutionContext;
pub use edge::{EdgeMap, EdgeMapError, EdgeProducer};
pub use metadata::{AiHints, NodeMetadata};
pub use node::{Node, NodeFault};
pub use runtime::{RuntimeEmitter, RuntimeEvent};
