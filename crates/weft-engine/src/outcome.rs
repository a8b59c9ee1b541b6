use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One dispatched step in the recorded trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
  /// Document path of the step, e.g. `workflow[1].success?[0]`.
  pub path: String,
  /// Node id, or `$.path` for a state setter.
  pub node_id: String,
  /// The edge the node returned (`set` for state setters).
  pub edge: String,
  pub duration_ms: u64,
}

/// Result of a complete workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
  pub execution_id: String,
  /// Final state snapshot.
  pub state: Value,
  /// Every dispatch, in order.
  pub trace: Vec<TraceEntry>,
}
