//! The `empty` node: a no-op, commonly the body of a `done?` handler.

use async_trait::async_trait;
use serde_json::{Value, json};
use weft_node::{AiHints, EdgeMap, ExecutionContext, Node, NodeFault, NodeMetadata};

pub struct EmptyNode {
  metadata: NodeMetadata,
}

impl EmptyNode {
  pub fn new() -> Self {
    Self {
      metadata: NodeMetadata {
        id: "empty".to_string(),
        name: "Empty".to_string(),
        version: "1.0.0".to_string(),
        description: None,
        inputs: vec![],
        outputs: vec![],
        ai_hints: AiHints {
          purpose: "Do nothing and succeed".to_string(),
          when_to_use: "As a placeholder handler body".to_string(),
          expected_edges: vec!["success".to_string()],
          example_usage: None,
          example_config: None,
          get_from_state: None,
        },
        is_loop: false,
        continue_edges: vec![],
      },
    }
  }
}

impl Default for EmptyNode {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Node for EmptyNode {
  fn metadata(&self) -> &NodeMetadata {
    &self.metadata
  }

  async fn execute(&self, _ctx: &ExecutionContext, _config: &Value) -> Result<EdgeMap, NodeFault> {
    Ok(EdgeMap::single("success", || json!({})))
  }
}
