use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use weft_state::StateManager;

use crate::runtime::RuntimeEmitter;

/// Per-invocation context handed to a node's `execute`.
///
/// Lives for the duration of one workflow run and is rebuilt for every step;
/// it is never shared across runs.
#[derive(Clone)]
pub struct ExecutionContext {
  /// Unique id of this workflow run.
  pub execution_id: String,
  /// Id of the document being executed.
  pub workflow_id: String,
  /// Id of the node currently being dispatched.
  pub node_id: String,
  /// The run's state map.
  pub state: Arc<StateManager>,
  /// The node's config after interpolation, handler keys stripped.
  pub inputs: Value,
  /// Streaming hooks for nodes that emit progressive output. Absent when the
  /// initiator has no use for them (CLI one-shots, cron fires).
  pub runtime: Option<Arc<dyn RuntimeEmitter>>,
  /// Cooperative cancellation for this run. Nodes may observe it and return
  /// early; the engine checks it between dispatches either way.
  pub cancel: CancellationToken,
}

impl ExecutionContext {
  /// Emit a runtime event if an emitter is attached.
  pub fn emit(&self, event: crate::runtime::RuntimeEvent) {
    if let Some(runtime) = &self.runtime {
      runtime.emit(event);
    }
  }
}

impl std::fmt::Debug for ExecutionContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecutionContext")
      .field("execution_id", &self.execution_id)
      .field("workflow_id", &self.workflow_id)
      .field("node_id", &self.node_id)
      .field("inputs", &self.inputs)
      .finish_non_exhaustive()
  }
}
