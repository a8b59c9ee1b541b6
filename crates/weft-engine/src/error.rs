use serde_json::Value;
use thiserror::Error;
use weft_state::StateError;

/// Errors that terminate a workflow run.
#[derive(Debug, Error)]
pub enum EngineError {
  /// A step could not be picked apart (should have been caught statically).
  #[error("malformed step at {path}: {message}")]
  MalformedStep { path: String, message: String },

  /// Referenced node id absent from the effective scope at dispatch time.
  #[error("node '{node_id}' not registered for this host (at {path})")]
  UnknownNode { path: String, node_id: String },

  /// The node broke the exactly-one-edge contract.
  #[error("protocol violation at {path}: {message}")]
  Protocol { path: String, message: String },

  /// An `error` edge reached a step with no handler for it.
  #[error("unhandled error at {path}: {code}: {message}")]
  Unhandled {
    path: String,
    code: String,
    message: String,
    data: Value,
  },

  /// A state write failed.
  #[error("state write failed at {path}")]
  State {
    path: String,
    #[source]
    source: StateError,
  },

  /// Cancellation was observed between dispatches.
  #[error("execution cancelled at {path}")]
  Cancelled { path: String },

  /// The per-request timeout expired.
  #[error("execution timed out after {elapsed_ms} ms at {path}")]
  Timeout { path: String, elapsed_ms: u64 },

  /// The per-execution dispatch budget ran out. Guarantees termination for
  /// loops whose own iteration guards are broken.
  #[error("dispatch budget of {limit} exhausted")]
  DispatchBudgetExhausted { limit: usize },
}

impl EngineError {
  /// Stable error code for protocol replies and execution records.
  pub fn code(&self) -> &str {
    match self {
      EngineError::MalformedStep { .. } => "MALFORMED_STEP",
      EngineError::UnknownNode { .. } => "UNKNOWN_NODE",
      EngineError::Protocol { .. } => "PROTOCOL_ERROR",
      EngineError::Unhandled { code, .. } => code,
      EngineError::State { .. } => "STATE_ERROR",
      EngineError::Cancelled { .. } => "CANCELLED",
      EngineError::Timeout { .. } => "TIMEOUT",
      EngineError::DispatchBudgetExhausted { .. } => "MAX_DISPATCHES_EXCEEDED",
    }
  }

  /// The step path where the run stopped, when known.
  pub fn path(&self) -> Option<&str> {
    match self {
      EngineError::MalformedStep { path, .. }
      | EngineError::UnknownNode { path, .. }
      | EngineError::Protocol { path, .. }
      | EngineError::Unhandled { path, .. }
      | EngineError::State { path, .. }
      | EngineError::Cancelled { path }
      | EngineError::Timeout { path, .. } => Some(path),
      EngineError::DispatchBudgetExhausted { .. } => None,
    }
  }
}
