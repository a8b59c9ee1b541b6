use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DocumentError;
use crate::step::Step;

/// A workflow document as persisted and sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
  /// Identifier, unique within a store. `[A-Za-z0-9_-]+`.
  pub id: String,
  /// Human label.
  pub name: String,
  /// Semver `X.Y.Z`.
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Initial `path -> value` entries for the run's state map.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub initial_state: Option<Map<String, Value>>,
  /// The ordered step sequence.
  pub workflow: Vec<Step>,
}

impl WorkflowDocument {
  /// Parse a document from JSON text.
  pub fn from_json(text: &str) -> Result<Self, DocumentError> {
    Ok(serde_json::from_str(text)?)
  }

  /// Parse a document from an already-decoded JSON value.
  pub fn from_value(value: Value) -> Result<Self, DocumentError> {
    Ok(serde_json::from_value(value)?)
  }

  /// Serialise back to JSON text.
  pub fn to_json(&self) -> Result<String, DocumentError> {
    Ok(serde_json::to_string(self)?)
  }

  /// Whether `id` fits the identifier alphabet `[A-Za-z0-9_-]+`.
  pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
      && id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
  }

  /// The document version parsed as semver.
  pub fn semver(&self) -> Result<semver::Version, semver::Error> {
    self.version.parse()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn demo() -> Value {
    json!({
      "id": "demo",
      "name": "Demo",
      "version": "1.0.0",
      "initialState": { "x": 1 },
      "workflow": [
        { "$.author": "Alice" },
        "log",
        { "auth": { "operation": "login", "success?": "log" } }
      ]
    })
  }

  #[test]
  fn parse_serialize_round_trip() {
    let document = WorkflowDocument::from_value(demo()).unwrap();
    let text = document.to_json().unwrap();
    let reparsed = WorkflowDocument::from_json(&text).unwrap();

    assert_eq!(document, reparsed);
    assert_eq!(serde_json::to_value(&reparsed).unwrap(), demo());
  }

  #[test]
  fn id_alphabet() {
    assert!(WorkflowDocument::is_valid_id("demo-1_A"));
    assert!(!WorkflowDocument::is_valid_id(""));
    assert!(!WorkflowDocument::is_valid_id("has space"));
    assert!(!WorkflowDocument::is_valid_id("dotted.id"));
  }

  #[test]
  fn semver_is_parsed() {
    let document = WorkflowDocument::from_value(demo()).unwrap();
    assert_eq!(document.semver().unwrap(), semver::Version::new(1, 0, 0));

    let mut bad = document;
    bad.version = "1.0".to_string();
    assert!(bad.semver().is_err());
  }

  #[test]
  fn missing_workflow_fails_to_parse() {
    let result = WorkflowDocument::from_value(json!({
      "id": "x", "name": "x", "version": "1.0.0"
    }));
    assert!(result.is_err());
  }
}
