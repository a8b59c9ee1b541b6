//! Edge maps: the single-edge result of a node invocation.

use serde_json::{Value, json};
use thiserror::Error;

/// Deferred producer for an edge's data record.
///
/// Returning a thunk instead of a value lets the engine attach diagnostic
/// framing uniformly and skip serialisation for edges nobody consumes.
pub type EdgeProducer = Box<dyn FnOnce() -> Value + Send>;

/// The outgoing edges of one node invocation.
///
/// The contract requires exactly one entry; the engine rejects anything else
/// with a protocol error. The map type still permits zero or many entries so
/// that the violation is observable rather than unrepresentable.
#[derive(Default)]
pub struct EdgeMap {
  entries: Vec<(String, EdgeProducer)>,
}

/// A malformed edge map, fatal to the run.
#[derive(Debug, Error, PartialEq)]
pub enum EdgeMapError {
  #[error("node returned no edges")]
  Empty,

  #[error("node returned multiple edges: {labels:?}")]
  Multiple { labels: Vec<String> },
}

impl EdgeMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// An edge map with a single deferred entry.
  pub fn single(
    edge: impl Into<String>,
    producer: impl FnOnce() -> Value + Send + 'static,
  ) -> Self {
    let mut map = Self::new();
    map.insert(edge, producer);
    map
  }

  /// An edge map with a single eager value.
  pub fn value(edge: impl Into<String>, value: Value) -> Self {
    Self::single(edge, move || value)
  }

  /// The conventional `error` edge carrying `{code, message}`.
  pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
    let (code, message) = (code.into(), message.into());
    Self::single("error", move || json!({ "code": code, "message": message }))
  }

  pub fn insert(
    &mut self,
    edge: impl Into<String>,
    producer: impl FnOnce() -> Value + Send + 'static,
  ) {
    self.entries.push((edge.into(), Box::new(producer)));
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Edge labels present, in insertion order.
  pub fn labels(&self) -> Vec<String> {
    self.entries.iter().map(|(label, _)| label.clone()).collect()
  }

  /// Enforce the exactly-one-edge contract.
  pub fn into_single(mut self) -> Result<(String, EdgeProducer), EdgeMapError> {
    match self.entries.len() {
      0 => Err(EdgeMapError::Empty),
      1 => {
        let (label, producer) = self.entries.remove(0);
        Ok((label, producer))
      }
      _ => Err(EdgeMapError::Multiple {
        labels: self.labels(),
      }),
    }
  }
}

impl std::fmt::Debug for EdgeMap {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EdgeMap").field("labels", &self.labels()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_edge_resolves() {
    let map = EdgeMap::single("success", || json!({ "ok": true }));
    let (label, producer) = map.into_single().unwrap();

    assert_eq!(label, "success");
    assert_eq!(producer(), json!({ "ok": true }));
  }

  #[test]
  fn empty_map_is_rejected() {
    let err = EdgeMap::new().into_single().err().unwrap();
    assert_eq!(err, EdgeMapError::Empty);
  }

  #[test]
  fn multiple_edges_are_rejected() {
    let mut map = EdgeMap::new();
    map.insert("success", || json!(1));
    map.insert("error", || json!(2));

    let err = map.into_single().err().unwrap();
    assert_eq!(
      err,
      EdgeMapError::Multiple {
        labels: vec!["success".to_string(), "error".to_string()]
      }
    );
  }

  #[test]
  fn error_constructor_shapes_payload() {
    let (label, producer) = EdgeMap::error("BOOM", "it broke").into_single().unwrap();

    assert_eq!(label, "error");
    assert_eq!(producer(), json!({ "code": "BOOM", "message": "it broke" }));
  }
}
