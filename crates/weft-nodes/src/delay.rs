//! The `delay` node: suspend the execution for a duration.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use weft_node::{AiHints, EdgeMap, ExecutionContext, Node, NodeFault, NodeMetadata};

pub struct DelayNode {
  metadata: NodeMetadata,
}

impl DelayNode {
  pub fn new() -> Self {
    Self {
      metadata: NodeMetadata {
        id: "delay".to_string(),
        name: "Delay".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Suspend for durationMs before continuing".to_string()),
        inputs: vec!["durationMs".to_string()],
        outputs: vec!["waitedMs".to_string()],
        ai_hints: AiHints {
          purpose: "Pause the workflow for a fixed duration".to_string(),
          when_to_use: "Rate limiting, polling intervals, settle-down waits".to_string(),
          expected_edges: vec!["success".to_string(), "error".to_string()],
          example_usage: None,
          example_config: Some(json!({ "durationMs": 250 })),
          get_from_state: None,
        },
        is_loop: false,
        continue_edges: vec![],
      },
    }
  }
}

impl Default for DelayNode {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Node for DelayNode {
  fn metadata(&self) -> &NodeMetadata {
    &self.metadata
  }

  fn validate_config(&self, config: &Value) -> Result<(), Vec<String>> {
    match config.get("durationMs") {
      Some(v) if v.is_u64() => Ok(()),
      Some(_) => Err(vec!["durationMs must be a non-negative integer".to_string()]),
      None => Err(vec!["missing required parameter 'durationMs'".to_string()]),
    }
  }

  async fn execute(&self, ctx: &ExecutionContext, config: &Value) -> Result<EdgeMap, NodeFault> {
    let duration_ms = config.get("durationMs").and_then(Value::as_u64).unwrap_or(0);

    tokio::select! {
      _ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {
        Ok(EdgeMap::single("success", move || json!({ "waitedMs": duration_ms })))
      }
      _ = ctx.cancel.cancelled() => Err(NodeFault::cancelled()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use tokio_util::sync::CancellationToken;
  use weft_state::StateManager;

  fn ctx(cancel: CancellationToken) -> ExecutionContext {
    ExecutionContext {
      execution_id: "x".to_string(),
      workflow_id: "w".to_string(),
      node_id: "delay".to_string(),
      state: Arc::new(StateManager::new()),
      inputs: Value::Null,
      runtime: None,
      cancel,
    }
  }

  #[tokio::test(start_paused = true)]
  async fn waits_then_succeeds() {
    let node = DelayNode::new();
    let (edge, producer) = node
      .execute(&ctx(CancellationToken::new()), &json!({ "durationMs": 50 }))
      .await
      .unwrap()
      .into_single()
      .unwrap();

    assert_eq!(edge, "success");
    assert_eq!(producer(), json!({ "waitedMs": 50 }));
  }

  #[tokio::test(start_paused = true)]
  async fn observes_cancellation() {
    let node = DelayNode::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = node
      .execute(&ctx(cancel), &json!({ "durationMs": 60_000 }))
      .await
      .unwrap_err();
    assert_eq!(err.code, "CANCELLED");
  }
}
