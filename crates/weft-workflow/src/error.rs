use thiserror::Error;

/// Errors raised while parsing a document or picking a step apart.
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("invalid workflow JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("bare state-setter reference '{key}': setters must carry a value")]
  BareSetter { key: String },

  #[error("step has an empty node id")]
  EmptyNodeId,

  #[error("inline step must have exactly one key, found {keys:?}")]
  MultiKeyStep { keys: Vec<String> },

  #[error("config for node '{node_id}' is not an object")]
  ConfigNotObject { node_id: String },

  #[error("handler '{label}?' body must be a step, a sequence of steps, or a node reference")]
  InvalidHandlerBody { label: String },
}
