use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable description of a node, declared once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
  pub id: String,
  pub name: String,
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Names of config parameters the node reads.
  #[serde(default)]
  pub inputs: Vec<String>,
  /// Names of fields the node produces in its edge data.
  #[serde(default)]
  pub outputs: Vec<String>,
  pub ai_hints: AiHints,
  /// Marks the node as a loop node even without the `...` step suffix.
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub is_loop: bool,
  /// Edges that re-dispatch a loop step instead of advancing.
  #[serde(default = "default_continue_edges")]
  pub continue_edges: Vec<String>,
}

/// Guidance for agents (and humans) composing workflows out of this node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiHints {
  pub purpose: String,
  pub when_to_use: String,
  /// Edge labels this node is known to emit.
  #[serde(default)]
  pub expected_edges: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example_usage: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub example_config: Option<Value>,
  /// State paths the node reads, for discovery tooling.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub get_from_state: Option<String>,
}

fn default_continue_edges() -> Vec<String> {
  vec!["do".to_string(), "continue".to_string()]
}

impl NodeMetadata {
  /// Whether `edge` belongs to this node's loop continue-set.
  pub fn is_continue_edge(&self, edge: &str) -> bool {
    self.continue_edges.iter().any(|e| e == edge)
  }

  /// Whether `edge` is declared in `ai_hints.expected_edges`.
  pub fn declares_edge(&self, edge: &str) -> bool {
    self.ai_hints.expected_edges.iter().any(|e| e == edge)
  }
}
