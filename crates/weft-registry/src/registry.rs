use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use weft_node::{Node, NodeMetadata};

use crate::scope::NodeScope;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// Same `(scope, id)` registered again with a different version.
  #[error(
    "node '{id}' already registered in scope {scope} at version {existing} (got {requested})"
  )]
  DuplicateRegistration {
    scope: NodeScope,
    id: String,
    existing: String,
    requested: String,
  },
}

/// Keyed multi-scope store mapping node id to node instance.
#[derive(Default)]
pub struct NodeRegistry {
  nodes: RwLock<HashMap<(NodeScope, String), Arc<dyn Node>>>,
  discovered: RwLock<HashSet<NodeScope>>,
}

impl NodeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a node under a scope.
  ///
  /// Idempotent on `(scope, id)` when the version matches; re-registration
  /// with a different version fails.
  pub fn register(&self, scope: NodeScope, node: Arc<dyn Node>) -> Result<(), RegistryError> {
    let metadata = node.metadata();
    let key = (scope, metadata.id.clone());

    let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
    if let Some(existing) = nodes.get(&key) {
      let existing_version = &existing.metadata().version;
      if existing_version != &metadata.version {
        return Err(RegistryError::DuplicateRegistration {
          scope,
          id: metadata.id.clone(),
          existing: existing_version.clone(),
          requested: metadata.version.clone(),
        });
      }
      return Ok(());
    }
    nodes.insert(key, node);
    Ok(())
  }

  /// One-shot bulk registration from a host-provided provider list.
  ///
  /// Repeat calls for an already-discovered scope are ignored; returns the
  /// number of nodes inserted.
  pub fn discover(
    &self,
    scope: NodeScope,
    providers: Vec<Arc<dyn Node>>,
  ) -> Result<usize, RegistryError> {
    {
      let mut discovered = self.discovered.write().unwrap_or_else(|e| e.into_inner());
      if !discovered.insert(scope) {
        return Ok(0);
      }
    }
    let count = providers.len();
    for node in providers {
      self.register(scope, node)?;
    }
    Ok(count)
  }

  /// Look up a node in a scope, falling back to universal for host scopes.
  pub fn get(&self, scope: NodeScope, id: &str) -> Option<Arc<dyn Node>> {
    let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
    if let Some(node) = nodes.get(&(scope, id.to_string())) {
      return Some(Arc::clone(node));
    }
    let fallback = scope.fallback()?;
    nodes.get(&(fallback, id.to_string())).map(Arc::clone)
  }

  /// Metadata of every node visible to a scope (own entries plus universal),
  /// sorted by id. A scope-local entry shadows a universal one with the
  /// same id.
  pub fn list(&self, scope: NodeScope) -> Vec<NodeMetadata> {
    let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
    let mut by_id: HashMap<&str, &Arc<dyn Node>> = HashMap::new();
    if let Some(fallback) = scope.fallback() {
      for ((entry_scope, _), node) in nodes.iter() {
        if *entry_scope == fallback {
          by_id.insert(&node.metadata().id, node);
        }
      }
    }
    for ((entry_scope, _), node) in nodes.iter() {
      if *entry_scope == scope {
        by_id.insert(&node.metadata().id, node);
      }
    }

    let mut listed: Vec<NodeMetadata> =
      by_id.values().map(|node| node.metadata().clone()).collect();
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    listed
  }

  /// Metadata of nodes registered directly under a scope (no fallback),
  /// sorted by id. For management surfaces.
  pub fn by_source(&self, scope: NodeScope) -> Vec<NodeMetadata> {
    let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
    let mut listed: Vec<NodeMetadata> = nodes
      .iter()
      .filter(|((entry_scope, _), _)| *entry_scope == scope)
      .map(|(_, node)| node.metadata().clone())
      .collect();
    listed.sort_by(|a, b| a.id.cmp(&b.id));
    listed
  }
}

impl std::fmt::Debug for NodeRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
    f.debug_struct("NodeRegistry")
      .field("entries", &nodes.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use serde_json::Value;
  use weft_node::{AiHints, EdgeMap, ExecutionContext, NodeFault};

  struct StubNode {
    metadata: NodeMetadata,
  }

  impl StubNode {
    fn new(id: &str, version: &str) -> Arc<dyn Node> {
      Arc::new(Self {
        metadata: NodeMetadata {
          id: id.to_string(),
          name: id.to_string(),
          version: version.to_string(),
          description: None,
          inputs: vec![],
          outputs: vec![],
          ai_hints: AiHints::default(),
          is_loop: false,
          continue_edges: vec![],
        },
      })
    }
  }

  #[async_trait]
  impl Node for StubNode {
    fn metadata(&self) -> &NodeMetadata {
      &self.metadata
    }

    async fn execute(
      &self,
      _ctx: &ExecutionContext,
      _config: &Value,
    ) -> Result<EdgeMap, NodeFault> {
      Ok(EdgeMap::value("success", Value::Null))
    }
  }

  #[test]
  fn register_is_idempotent_on_same_version() {
    let registry = NodeRegistry::new();
    registry
      .register(NodeScope::Universal, StubNode::new("log", "1.0.0"))
      .unwrap();
    registry
      .register(NodeScope::Universal, StubNode::new("log", "1.0.0"))
      .unwrap();

    assert_eq!(registry.list(NodeScope::Universal).len(), 1);
  }

  #[test]
  fn version_conflict_fails() {
    let registry = NodeRegistry::new();
    registry
      .register(NodeScope::Universal, StubNode::new("log", "1.0.0"))
      .unwrap();

    let err = registry
      .register(NodeScope::Universal, StubNode::new("log", "2.0.0"))
      .unwrap_err();
    assert!(matches!(
      err,
      RegistryError::DuplicateRegistration { ref id, .. } if id == "log"
    ));
  }

  #[test]
  fn server_lookup_falls_back_to_universal() {
    let registry = NodeRegistry::new();
    registry
      .register(NodeScope::Universal, StubNode::new("log", "1.0.0"))
      .unwrap();
    registry
      .register(NodeScope::Server, StubNode::new("filesystem", "1.0.0"))
      .unwrap();

    assert!(registry.get(NodeScope::Server, "log").is_some());
    assert!(registry.get(NodeScope::Server, "filesystem").is_some());
    assert!(registry.get(NodeScope::Client, "filesystem").is_none());
    assert!(registry.get(NodeScope::Universal, "filesystem").is_none());
  }

  #[test]
  fn discover_is_one_shot() {
    let registry = NodeRegistry::new();
    let inserted = registry
      .discover(NodeScope::Server, vec![StubNode::new("a", "1.0.0")])
      .unwrap();
    assert_eq!(inserted, 1);

    let inserted = registry
      .discover(NodeScope::Server, vec![StubNode::new("b", "1.0.0")])
      .unwrap();
    assert_eq!(inserted, 0);
    assert!(registry.get(NodeScope::Server, "b").is_none());
  }

  #[test]
  fn list_merges_universal_and_sorts() {
    let registry = NodeRegistry::new();
    registry
      .register(NodeScope::Universal, StubNode::new("log", "1.0.0"))
      .unwrap();
    registry
      .register(NodeScope::Server, StubNode::new("auth", "1.0.0"))
      .unwrap();

    let ids: Vec<String> = registry
      .list(NodeScope::Server)
      .into_iter()
      .map(|m| m.id)
      .collect();
    assert_eq!(ids, vec!["auth", "log"]);

    let sources: Vec<String> = registry
      .by_source(NodeScope::Server)
      .into_iter()
      .map(|m| m.id)
      .collect();
    assert_eq!(sources, vec!["auth"]);
  }
}
