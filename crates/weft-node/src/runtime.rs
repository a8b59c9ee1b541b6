//! Runtime hooks for nodes that stream.
//!
//! A node performing progressive work (token deltas, partial objects) owns
//! its own task and pushes chunks through the emitter on its context. The
//! engine neither awaits nor multiplexes these events; initiators decide
//! where they go (a WebSocket session forwards them to the client, the CLI
//! drops them).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Progressive output from a single node invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeEvent {
  StreamChunk {
    node_id: String,
    chunk: Value,
  },
  StreamComplete {
    node_id: String,
  },
  StreamError {
    node_id: String,
    message: String,
  },
}

/// Sink for [`RuntimeEvent`]s, implemented by initiators.
pub trait RuntimeEmitter: Send + Sync {
  fn emit(&self, event: RuntimeEvent);
}
