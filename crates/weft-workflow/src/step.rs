//! The step grammar.
//!
//! A step is one position in a workflow sequence:
//! - `"log"` — bare reference to a node id;
//! - `"poll..."` — bare reference with the loop suffix;
//! - `{"$.author": "Alice"}` — state setter, writes a path and advances;
//! - `{"auth": {"operation": "login", "success?": ...}}` — inline node with
//!   config. Config keys ending in `?` are edge handlers; the rest are
//!   declarative parameters handed to the node after interpolation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DocumentError;

/// Suffix marking a loop step: re-dispatch on the node's continue edges.
pub const LOOP_SUFFIX: &str = "...";

/// Prefix marking a state path, both in setter keys and in references.
pub const STATE_PREFIX: &str = "$.";

/// One position in a workflow sequence, as parsed from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
  /// A string naming a node id, possibly with the loop suffix.
  Ref(String),
  /// A single-key mapping: node id (or `$.path`) to config (or value).
  Inline(Map<String, Value>),
}

/// A step picked apart into its meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStep<'a> {
  /// Write `value` (after interpolation) to `path` and advance. Never emits
  /// edges and cannot carry handlers.
  StateSet { path: &'a str, value: &'a Value },
  /// Dispatch a node.
  Node {
    /// Registry id, loop suffix stripped.
    id: &'a str,
    /// Whether the step key carried the `...` suffix.
    is_loop: bool,
    config: StepConfig<'a>,
  },
}

impl Step {
  /// Pick the step apart, enforcing the single-key inline shape.
  pub fn parse(&self) -> Result<ParsedStep<'_>, DocumentError> {
    match self {
      Step::Ref(key) => {
        if key.starts_with(STATE_PREFIX) {
          return Err(DocumentError::BareSetter { key: key.clone() });
        }
        let (id, is_loop) = split_loop_suffix(key);
        if id.is_empty() {
          return Err(DocumentError::EmptyNodeId);
        }
        Ok(ParsedStep::Node {
          id,
          is_loop,
          config: StepConfig { map: None },
        })
      }
      Step::Inline(map) => {
        let mut entries = map.iter();
        let (key, value) = match (entries.next(), entries.next()) {
          (Some(entry), None) => entry,
          _ => {
            return Err(DocumentError::MultiKeyStep {
              keys: map.keys().cloned().collect(),
            });
          }
        };

        if let Some(path) = key.strip_prefix(STATE_PREFIX) {
          return Ok(ParsedStep::StateSet { path, value });
        }

        let (id, is_loop) = split_loop_suffix(key);
        if id.is_empty() {
          return Err(DocumentError::EmptyNodeId);
        }
        let config = match value {
          Value::Object(config) => StepConfig { map: Some(config) },
          _ => {
            return Err(DocumentError::ConfigNotObject {
              node_id: id.to_string(),
            });
          }
        };
        Ok(ParsedStep::Node {
          id,
          is_loop,
          config,
        })
      }
    }
  }

  /// The node id this step dispatches, if it is a node step.
  pub fn node_id(&self) -> Option<&str> {
    match self.parse() {
      Ok(ParsedStep::Node { id, .. }) => Some(id),
      _ => None,
    }
  }
}

fn split_loop_suffix(key: &str) -> (&str, bool) {
  match key.strip_suffix(LOOP_SUFFIX) {
    Some(id) => (id, true),
    None => (key, false),
  }
}

/// View over an inline step's config: parameters vs edge handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig<'a> {
  map: Option<&'a Map<String, Value>>,
}

impl<'a> StepConfig<'a> {
  /// Declarative parameters: every key not ending in `?`.
  pub fn params(&self) -> Map<String, Value> {
    self
      .map
      .map(|map| {
        map
          .iter()
          .filter(|(key, _)| !key.ends_with('?'))
          .map(|(key, value)| (key.clone(), value.clone()))
          .collect()
      })
      .unwrap_or_default()
  }

  /// Edge handlers `(label, body)`, in declaration order, labels stripped of
  /// the trailing `?`.
  pub fn handlers(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
    self
      .map
      .into_iter()
      .flat_map(|map| map.iter())
      .filter_map(|(key, value)| key.strip_suffix('?').map(|label| (label, value)))
  }

  /// The handler body for `edge`, if one is declared.
  pub fn handler(&self, edge: &str) -> Option<&'a Value> {
    self.handlers().find(|(label, _)| *label == edge).map(|(_, body)| body)
  }
}

/// The body of an edge handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerBody {
  /// A single nested step (inline map or bare reference).
  Single(Step),
  /// A sequence of steps, executed in order.
  Sequence(Vec<Step>),
}

impl HandlerBody {
  /// Interpret a handler value: a nested step, a sequence, or a bare ref.
  pub fn from_value(label: &str, value: &Value) -> Result<Self, DocumentError> {
    fn step_from(label: &str, value: &Value) -> Result<Step, DocumentError> {
      match value {
        Value::String(key) => Ok(Step::Ref(key.clone())),
        Value::Object(map) => Ok(Step::Inline(map.clone())),
        _ => Err(DocumentError::InvalidHandlerBody {
          label: label.to_string(),
        }),
      }
    }

    match value {
      Value::Array(items) => Ok(Self::Sequence(
        items
          .iter()
          .map(|item| step_from(label, item))
          .collect::<Result<_, _>>()?,
      )),
      other => Ok(Self::Single(step_from(label, other)?)),
    }
  }

  /// The handler's steps in execution order.
  pub fn into_steps(self) -> Vec<Step> {
    match self {
      Self::Single(step) => vec![step],
      Self::Sequence(steps) => steps,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn step(value: Value) -> Step {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn bare_ref_parses() {
    let step = step(json!("log"));
    assert!(matches!(
      step.parse().unwrap(),
      ParsedStep::Node { id: "log", is_loop: false, .. }
    ));
  }

  #[test]
  fn loop_suffix_is_stripped() {
    let step = step(json!("poll..."));
    assert!(matches!(
      step.parse().unwrap(),
      ParsedStep::Node { id: "poll", is_loop: true, .. }
    ));
  }

  #[test]
  fn state_setter_parses() {
    let step = step(json!({ "$.author": "Alice" }));
    match step.parse().unwrap() {
      ParsedStep::StateSet { path, value } => {
        assert_eq!(path, "author");
        assert_eq!(value, &json!("Alice"));
      }
      other => panic!("expected state setter, got {other:?}"),
    }
  }

  #[test]
  fn bare_setter_ref_is_rejected() {
    let step = step(json!("$.author"));
    assert!(matches!(
      step.parse(),
      Err(DocumentError::BareSetter { .. })
    ));
  }

  #[test]
  fn multi_key_inline_is_rejected() {
    let step = step(json!({ "a": {}, "b": {} }));
    assert!(matches!(
      step.parse(),
      Err(DocumentError::MultiKeyStep { .. })
    ));
  }

  #[test]
  fn config_splits_params_and_handlers() {
    let step = step(json!({
      "auth": {
        "operation": "login",
        "success?": "log",
        "error?": [ "log", { "$.failed": true } ]
      }
    }));

    let ParsedStep::Node { id, config, .. } = step.parse().unwrap() else {
      panic!("expected node step");
    };
    assert_eq!(id, "auth");
    assert_eq!(config.params(), json!({ "operation": "login" }).as_object().unwrap().clone());

    let labels: Vec<&str> = config.handlers().map(|(label, _)| label).collect();
    assert_eq!(labels, vec!["success", "error"]);
    assert!(config.handler("success").is_some());
    assert!(config.handler("missing").is_none());
  }

  #[test]
  fn handler_body_forms() {
    let single = HandlerBody::from_value("success", &json!({ "log": {} })).unwrap();
    assert_eq!(single.into_steps().len(), 1);

    let reference = HandlerBody::from_value("success", &json!("log")).unwrap();
    assert_eq!(reference.into_steps(), vec![Step::Ref("log".to_string())]);

    let sequence = HandlerBody::from_value("success", &json!([ "a", "b" ])).unwrap();
    assert_eq!(sequence.into_steps().len(), 2);

    assert!(HandlerBody::from_value("success", &json!(42)).is_err());
  }

  #[test]
  fn step_round_trips_through_json() {
    let original = json!({ "auth": { "operation": "login", "success?": "log" } });
    let parsed: Step = serde_json::from_value(original.clone()).unwrap();
    assert_eq!(serde_json::to_value(&parsed).unwrap(), original);
  }
}
