//! The `while` loop node.
//!
//! Evaluates a `{left, operator, right}` condition each dispatch. While it
//! holds, the node emits `do` (its only continue edge) and the engine
//! re-dispatches this step after running the `do?` handler; when it stops
//! holding, the node emits `done`. The iteration counter lives in the
//! reserved state slot `__while_<nodeId>` and is removed on termination.

use async_trait::async_trait;
use serde_json::{Value, json};
use weft_node::{AiHints, EdgeMap, ExecutionContext, Node, NodeFault, NodeMetadata};

/// Iteration bound applied when the config omits `maxIterations`.
pub const DEFAULT_MAX_ITERATIONS: u64 = 1000;

const OPERATORS: &[&str] = &["<", "<=", ">", ">=", "==", "!="];

pub struct WhileNode {
  metadata: NodeMetadata,
}

impl WhileNode {
  pub fn new() -> Self {
    Self {
      metadata: NodeMetadata {
        id: "while".to_string(),
        name: "While".to_string(),
        version: "1.0.0".to_string(),
        description: Some("Repeat the do? handler while a condition holds".to_string()),
        inputs: vec!["condition".to_string(), "maxIterations".to_string()],
        outputs: vec!["iteration".to_string(), "iterations".to_string()],
        ai_hints: AiHints {
          purpose: "Loop over a handler while a state condition holds".to_string(),
          when_to_use: "Bounded iteration driven by state, e.g. polling or counting".to_string(),
          expected_edges: vec!["do".to_string(), "done".to_string(), "error".to_string()],
          example_usage: Some(
            "{\"while\": {\"condition\": {\"left\": \"$.i\", \"operator\": \"<\", \
             \"right\": \"3\"}, \"do?\": [...], \"done?\": \"empty\"}}"
              .to_string(),
          ),
          example_config: Some(json!({
            "condition": { "left": "$.i", "operator": "<", "right": "3" },
            "maxIterations": 100
          })),
          get_from_state: None,
        },
        is_loop: true,
        continue_edges: vec!["do".to_string()],
      },
    }
  }

  fn counter_slot(node_id: &str) -> String {
    format!("__while_{node_id}")
  }
}

impl Default for WhileNode {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Node for WhileNode {
  fn metadata(&self) -> &NodeMetadata {
    &self.metadata
  }

  fn validate_config(&self, config: &Value) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    match config.get("condition") {
      None => problems.push("missing required parameter 'condition'".to_string()),
      Some(condition) => {
        for key in ["left", "operator", "right"] {
          if condition.get(key).is_none() {
            problems.push(format!("condition is missing '{key}'"));
          }
        }
        if let Some(op) = condition.get("operator").and_then(Value::as_str) {
          if !OPERATORS.contains(&op) {
            problems.push(format!("unsupported operator '{op}'"));
          }
        }
      }
    }
    if let Some(max) = config.get("maxIterations") {
      if !max.is_u64() {
        problems.push("maxIterations must be a non-negative integer".to_string());
      }
    }
    if problems.is_empty() { Ok(()) } else { Err(problems) }
  }

  async fn execute(&self, ctx: &ExecutionContext, config: &Value) -> Result<EdgeMap, NodeFault> {
    let slot = Self::counter_slot(&ctx.node_id);
    let iterations = ctx
      .state
      .get(&slot)
      .and_then(|v| v.as_u64())
      .unwrap_or(0);
    let max_iterations = config
      .get("maxIterations")
      .and_then(Value::as_u64)
      .unwrap_or(DEFAULT_MAX_ITERATIONS);

    if iterations >= max_iterations {
      ctx.state.delete(&slot);
      return Ok(EdgeMap::single("error", move || {
        json!({
          "code": "MAX_ITERATIONS_EXCEEDED",
          "message": format!("while loop exceeded {max_iterations} iterations"),
          "iterationsExecuted": iterations
        })
      }));
    }

    let condition = config
      .get("condition")
      .ok_or_else(|| NodeFault::new("INVALID_CONFIG", "missing 'condition' parameter"))?;

    if evaluate(condition)? {
      let next = iterations + 1;
      ctx
        .state
        .set(&slot, json!(next))
        .map_err(|e| NodeFault::new("STATE_ERROR", e.to_string()))?;
      Ok(EdgeMap::single("do", move || json!({ "iteration": next })))
    } else {
      ctx.state.delete(&slot);
      Ok(EdgeMap::single("done", move || {
        json!({ "iterations": iterations })
      }))
    }
  }
}

/// Evaluate a `{left, operator, right}` condition over interpolated operands.
///
/// Operands that are numbers, or strings that parse as numbers, compare
/// numerically. Equality falls back to structural comparison; ordering over
/// non-numeric operands is a fault.
fn evaluate(condition: &Value) -> Result<bool, NodeFault> {
  let left = condition.get("left").unwrap_or(&Value::Null);
  let right = condition.get("right").unwrap_or(&Value::Null);
  let operator = condition
    .get("operator")
    .and_then(Value::as_str)
    .ok_or_else(|| NodeFault::new("INVALID_CONFIG", "condition is missing 'operator'"))?;

  if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
    return Ok(match operator {
      "<" => l < r,
      "<=" => l <= r,
      ">" => l > r,
      ">=" => l >= r,
      "==" => l == r,
      "!=" => l != r,
      other => {
        return Err(NodeFault::new(
          "INVALID_CONFIG",
          format!("unsupported operator '{other}'"),
        ));
      }
    });
  }

  match operator {
    "==" => Ok(left == right),
    "!=" => Ok(left != right),
    other => Err(NodeFault::new(
      "INVALID_CONDITION",
      format!("operator '{other}' needs numeric operands, got {left} and {right}"),
    )),
  }
}

fn as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use tokio_util::sync::CancellationToken;
  use weft_state::StateManager;

  fn ctx(state: Arc<StateManager>) -> ExecutionContext {
    ExecutionContext {
      execution_id: "x".to_string(),
      workflow_id: "w".to_string(),
      node_id: "while".to_string(),
      state,
      inputs: Value::Null,
      runtime: None,
      cancel: CancellationToken::new(),
    }
  }

  #[tokio::test]
  async fn emits_do_while_condition_holds() {
    let state = Arc::new(StateManager::new());
    state.set("i", json!(0)).unwrap();
    let node = WhileNode::new();
    let config = json!({ "condition": { "left": 0, "operator": "<", "right": "3" } });

    let (edge, producer) = node
      .execute(&ctx(Arc::clone(&state)), &config)
      .await
      .unwrap()
      .into_single()
      .unwrap();

    assert_eq!(edge, "do");
    assert_eq!(producer(), json!({ "iteration": 1 }));
    assert_eq!(state.get("__while_while"), Some(json!(1)));
  }

  #[tokio::test]
  async fn emits_done_and_clears_slot() {
    let state = Arc::new(StateManager::new());
    state.set("__while_while", json!(2)).unwrap();
    let node = WhileNode::new();
    let config = json!({ "condition": { "left": 5, "operator": "<", "right": 3 } });

    let (edge, producer) = node
      .execute(&ctx(Arc::clone(&state)), &config)
      .await
      .unwrap()
      .into_single()
      .unwrap();

    assert_eq!(edge, "done");
    assert_eq!(producer(), json!({ "iterations": 2 }));
    assert_eq!(state.get("__while_while"), None);
  }

  #[tokio::test]
  async fn max_iterations_guard_fires() {
    let state = Arc::new(StateManager::new());
    state.set("__while_while", json!(2)).unwrap();
    let node = WhileNode::new();
    let config = json!({
      "condition": { "left": 0, "operator": "<", "right": 3 },
      "maxIterations": 2
    });

    let (edge, producer) = node
      .execute(&ctx(Arc::clone(&state)), &config)
      .await
      .unwrap()
      .into_single()
      .unwrap();

    assert_eq!(edge, "error");
    let data = producer();
    assert_eq!(data["code"], "MAX_ITERATIONS_EXCEEDED");
    assert_eq!(data["iterationsExecuted"], 2);
    assert_eq!(state.get("__while_while"), None);
  }

  #[test]
  fn condition_operators() {
    let holds = |l: Value, op: &str, r: Value| {
      evaluate(&json!({ "left": l, "operator": op, "right": r })).unwrap()
    };

    assert!(holds(json!(1), "<", json!(2)));
    assert!(holds(json!("2"), ">=", json!(2)));
    assert!(holds(json!("a"), "==", json!("a")));
    assert!(holds(json!("a"), "!=", json!("b")));
    assert!(!holds(json!(2), "<", json!("1")));

    let err = evaluate(&json!({ "left": "a", "operator": "<", "right": "b" })).unwrap_err();
    assert_eq!(err.code, "INVALID_CONDITION");
  }

  #[test]
  fn config_validation() {
    let node = WhileNode::new();
    assert!(node.validate_config(&json!({
      "condition": { "left": 1, "operator": "<", "right": 2 }
    })).is_ok());

    let problems = node.validate_config(&json!({})).unwrap_err();
    assert_eq!(problems.len(), 1);

    let problems = node
      .validate_config(&json!({ "condition": { "left": 1, "operator": "~", "right": 2 } }))
      .unwrap_err();
    assert!(problems[0].contains("unsupported operator"));
  }
}
