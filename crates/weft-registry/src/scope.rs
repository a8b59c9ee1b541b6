use serde::{Deserialize, Serialize};

/// Where a node is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeScope {
  /// Available to both hosts.
  Universal,
  /// Browser host only.
  Client,
  /// Server host only.
  Server,
}

impl NodeScope {
  /// The fallback scope consulted when a lookup misses.
  ///
  /// Server and client lookups fall back to universal; universal lookups
  /// have no fallback.
  pub fn fallback(self) -> Option<NodeScope> {
    match self {
      NodeScope::Universal => None,
      NodeScope::Client | NodeScope::Server => Some(NodeScope::Universal),
    }
  }
}

impl std::fmt::Display for NodeScope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      NodeScope::Universal => "universal",
      NodeScope::Client => "client",
      NodeScope::Server => "server",
    };
    f.write_str(name)
  }
}
