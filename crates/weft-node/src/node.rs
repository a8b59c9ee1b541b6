use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::context::ExecutionContext;
use crate::edge::EdgeMap;
use crate::metadata::NodeMetadata;

/// A runtime fault inside a node.
///
/// The engine re-expresses any `Err` as an `error` edge carrying
/// `{code, message}` and routes it like every other edge; it never retries.
/// Retry policy belongs to explicit retry nodes in the workflow.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct NodeFault {
  pub code: String,
  pub message: String,
}

impl NodeFault {
  pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      code: code.into(),
      message: message.into(),
    }
  }

  /// Fault for a node that observed its cancellation token.
  pub fn cancelled() -> Self {
    Self::new("CANCELLED", "execution cancelled")
  }
}

/// The capability every node satisfies.
#[async_trait]
pub trait Node: Send + Sync {
  /// Immutable metadata declared at construction.
  fn metadata(&self) -> &NodeMetadata;

  /// Static config validation, called by the validator before execution.
  ///
  /// The default accepts everything; nodes with structural requirements
  /// return one message per problem.
  fn validate_config(&self, _config: &Value) -> Result<(), Vec<String>> {
    Ok(())
  }

  /// Execute against the context with an interpolated config.
  ///
  /// Returns an [`EdgeMap`] with exactly one edge. Run-scoped data goes
  /// through `ctx.state`, never onto `self`.
  async fn execute(&self, ctx: &ExecutionContext, config: &Value) -> Result<EdgeMap, NodeFault>;
}
