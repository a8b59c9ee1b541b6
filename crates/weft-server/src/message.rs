//! The wire envelope and typed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Message type strings.
pub mod kind {
  pub const CONNECTED: &str = "connected";
  pub const PING: &str = "ping";
  pub const PONG: &str = "pong";
  pub const SUBSCRIBE: &str = "subscribe";
  pub const UNSUBSCRIBE: &str = "unsubscribe";
  pub const ERROR: &str = "error";

  pub const WORKFLOW_EXECUTE: &str = "workflow:execute";
  pub const WORKFLOW_RESULT: &str = "workflow:result";
  pub const WORKFLOW_ERROR: &str = "workflow:error";
  pub const WORKFLOW_PROGRESS: &str = "workflow:progress";
  pub const WORKFLOW_VALIDATE: &str = "workflow:validate";
  pub const WORKFLOW_VALIDATION_RESULT: &str = "workflow:validation-result";
  pub const WORKFLOW_CANCEL: &str = "workflow:cancel";
}

/// Every frame on the socket, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<Value>,
  #[serde(default = "Utc::now")]
  pub timestamp: DateTime<Utc>,
  #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
  pub client_id: Option<String>,
}

impl Envelope {
  pub fn new(kind: impl Into<String>, payload: Value) -> Self {
    Self {
      kind: kind.into(),
      payload: Some(payload),
      timestamp: Utc::now(),
      client_id: None,
    }
  }

  pub fn bare(kind: impl Into<String>) -> Self {
    Self {
      kind: kind.into(),
      payload: None,
      timestamp: Utc::now(),
      client_id: None,
    }
  }

  /// Decode the payload into a typed shape.
  pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
    let payload = self.payload.clone().unwrap_or(Value::Null);
    serde_json::from_value(payload)
  }
}

/// `workflow:execute` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePayload {
  pub workflow_definition: Value,
  #[serde(default)]
  pub execution_id: Option<String>,
  #[serde(default)]
  pub options: ExecuteOptions,
}

/// Options on `workflow:execute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteOptions {
  pub skip_validation: bool,
  /// Per-execution timeout in milliseconds.
  pub timeout: Option<u64>,
}

/// `workflow:validate` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePayload {
  pub workflow_definition: Value,
  pub validation_id: String,
}

/// `workflow:cancel` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPayload {
  pub execution_id: String,
}

/// `subscribe` / `unsubscribe` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPayload {
  pub channel: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn envelope_round_trips() {
    let text = r#"{"type":"ping","payload":{"n":1},"timestamp":"2026-01-01T00:00:00Z"}"#;
    let envelope: Envelope = serde_json::from_str(text).unwrap();
    assert_eq!(envelope.kind, "ping");
    assert_eq!(envelope.payload, Some(json!({ "n": 1 })));
    assert!(envelope.client_id.is_none());

    let out = serde_json::to_value(&envelope).unwrap();
    assert_eq!(out["type"], "ping");
  }

  #[test]
  fn missing_timestamp_defaults_to_now() {
    let envelope: Envelope = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(envelope.kind, "ping");
  }

  #[test]
  fn execute_payload_decodes() {
    let envelope = Envelope::new(
      kind::WORKFLOW_EXECUTE,
      json!({
        "workflowDefinition": { "id": "x" },
        "executionId": "e1",
        "options": { "skipValidation": true, "timeout": 5000 }
      }),
    );
    let payload: ExecutePayload = envelope.parse_payload().unwrap();
    assert_eq!(payload.execution_id.as_deref(), Some("e1"));
    assert!(payload.options.skip_validation);
    assert_eq!(payload.options.timeout, Some(5000));
  }
}
