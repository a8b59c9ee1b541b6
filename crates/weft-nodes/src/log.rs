//! The `log` node: writes a message to the host log.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use weft_node::{AiHints, EdgeMap, ExecutionContext, Node, NodeFault, NodeMetadata};

pub struct LogNode {
  metadata: NodeMetadata,
}

impl LogNode {
  pub fn new() -> Self {
    Self {
      metadata: NodeMetadata {
        id: "log".to_string(),
        name: "Log".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Write an interpolated message to the host log".to_string()),
        inputs: vec!["message".to_string(), "level".to_string()],
        outputs: vec!["logged".to_string()],
        ai_hints: AiHints {
          purpose: "Emit a log line from inside a workflow".to_string(),
          when_to_use: "Tracing workflow progress or surfacing state values".to_string(),
          expected_edges: vec!["success".to_string()],
          example_usage: Some("{\"log\": {\"message\": \"hello {{$.user}}\"}}".to_string()),
          example_config: Some(json!({ "message": "hello {{$.user}}", "level": "info" })),
          get_from_state: None,
        },
        is_loop: false,
        continue_edges: vec![],
      },
    }
  }
}

impl Default for LogNode {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Node for LogNode {
  fn metadata(&self) -> &NodeMetadata {
    &self.metadata
  }

  async fn execute(&self, ctx: &ExecutionContext, config: &Value) -> Result<EdgeMap, NodeFault> {
    let message = config
      .get("message")
      .and_then(Value::as_str)
      .unwrap_or("")
      .to_string();
    let level = config.get("level").and_then(Value::as_str).unwrap_or("info");

    match level {
      "debug" => debug!(workflow_id = %ctx.workflow_id, "{message}"),
      "warn" => warn!(workflow_id = %ctx.workflow_id, "{message}"),
      "error" => error!(workflow_id = %ctx.workflow_id, "{message}"),
      _ => info!(workflow_id = %ctx.workflow_id, "{message}"),
    }

    Ok(EdgeMap::single("success", move || {
      json!({ "logged": message })
    }))
  }
}
