use std::sync::Arc;

use weft_node::Node;
use weft_registry::{NodeRegistry, NodeScope};
use weft_workflow::{HandlerBody, ParsedStep, Step, WorkflowDocument};

use crate::report::{IssueCode, ValidationReport};

/// Static checker for workflow documents against a registry scope.
pub struct Validator {
  registry: Arc<NodeRegistry>,
  scope: NodeScope,
}

impl Validator {
  pub fn new(registry: Arc<NodeRegistry>, scope: NodeScope) -> Self {
    Self { registry, scope }
  }

  /// Validate a document. Errors block execution; warnings do not.
  pub fn validate(&self, document: &WorkflowDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !WorkflowDocument::is_valid_id(&document.id) {
      report.error(
        "id",
        IssueCode::InvalidId,
        format!("'{}' does not match [A-Za-z0-9_-]+", document.id),
      );
    }
    if document.semver().is_err() {
      report.error(
        "version",
        IssueCode::InvalidVersion,
        format!("'{}' is not a semver X.Y.Z version", document.version),
      );
    }
    if document.workflow.is_empty() {
      report.error("workflow", IssueCode::EmptyWorkflow, "workflow has no steps");
    }

    let mut enclosing = Vec::new();
    for (index, step) in document.workflow.iter().enumerate() {
      self.check_step(step, &format!("workflow[{index}]"), &mut enclosing, &mut report);
    }

    report.finish()
  }

  fn check_step(
    &self,
    step: &Step,
    path: &str,
    enclosing: &mut Vec<String>,
    report: &mut ValidationReport,
  ) {
    let parsed = match step.parse() {
      Ok(parsed) => parsed,
      Err(e) => {
        report.error(path, IssueCode::MalformedStep, e.to_string());
        return;
      }
    };

    match parsed {
      ParsedStep::StateSet { path: state_path, .. } => {
        if state_path.is_empty() || state_path.split('.').any(|s| s.is_empty()) {
          report.error(
            path,
            IssueCode::InvalidStateValue,
            format!("'$.{state_path}' is not a valid state path"),
          );
        }
      }
      ParsedStep::Node { id, is_loop, config } => {
        // A handler body may not reference any step it is nested under,
        // however deep. Repetition is expressed through loop steps, which
        // re-dispatch in place instead of nesting.
        if enclosing.iter().any(|outer| outer == id) {
          report.error(
            path,
            IssueCode::StructuralCycle,
            format!("handler nests a reference to enclosing step '{id}'"),
          );
          return;
        }

        let node = self.registry.get(self.scope, id);
        match &node {
          None => {
            // Message is just the id: callers embed it in their own framing.
            report.error(path, IssueCode::UnknownNode, id);
          }
          Some(node) => {
            let params = serde_json::Value::Object(config.params());
            if let Err(problems) = node.validate_config(&params) {
              for problem in problems {
                report.error(path, IssueCode::InvalidConfig, problem);
              }
            }
            self.check_loop_edges(node.as_ref(), is_loop, path, report);
          }
        }

        enclosing.push(id.to_string());
        for (label, body) in config.handlers() {
          self.check_handler(node.as_deref(), label, body, path, enclosing, report);
        }
        enclosing.pop();
      }
    }
  }

  fn check_loop_edges(
    &self,
    node: &dyn Node,
    step_is_loop: bool,
    path: &str,
    report: &mut ValidationReport,
  ) {
    let metadata = node.metadata();
    if !step_is_loop && !metadata.is_loop {
      return;
    }
    let has_terminate = metadata
      .ai_hints
      .expected_edges
      .iter()
      .any(|edge| !metadata.is_continue_edge(edge));
    if !has_terminate {
      report.warn(
        path,
        IssueCode::MissingTerminateEdge,
        format!(
          "loop node '{}' declares no edge outside its continue-set {:?}",
          metadata.id, metadata.continue_edges
        ),
      );
    }
  }

  fn check_handler(
    &self,
    node: Option<&dyn Node>,
    label: &str,
    body: &serde_json::Value,
    parent_path: &str,
    enclosing: &mut Vec<String>,
    report: &mut ValidationReport,
  ) {
    let handler_path = format!("{parent_path}.{label}?");

    if label.is_empty() {
      report.error(&handler_path, IssueCode::BadHandlerKey, "empty edge label");
      return;
    }

    if let Some(node) = node {
      if !node.metadata().declares_edge(label) {
        report.warn(
          &handler_path,
          IssueCode::UndeclaredEdge,
          format!(
            "node '{}' does not declare edge '{label}'",
            node.metadata().id
          ),
        );
      }
    }

    match HandlerBody::from_value(label, body) {
      Ok(HandlerBody::Single(step)) => {
        self.check_step(&step, &handler_path, enclosing, report);
      }
      Ok(HandlerBody::Sequence(steps)) => {
        for (index, step) in steps.iter().enumerate() {
          self.check_step(step, &format!("{handler_path}[{index}]"), enclosing, report);
        }
      }
      Err(e) => {
        report.error(&handler_path, IssueCode::BadHandlerKey, e.to_string());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use serde_json::{Value, json};
  use weft_node::{AiHints, EdgeMap, ExecutionContext, NodeFault, NodeMetadata};

  struct StubNode {
    metadata: NodeMetadata,
    required: Vec<&'static str>,
  }

  impl StubNode {
    fn with_edges(id: &str, edges: &[&str]) -> Arc<dyn Node> {
      Self::build(id, edges, &[], false, vec![])
    }

    fn looping(id: &str, edges: &[&str], continue_edges: Vec<String>) -> Arc<dyn Node> {
      Self::build(id, edges, &[], true, continue_edges)
    }

    fn build(
      id: &str,
      edges: &[&str],
      required: &[&'static str],
      is_loop: bool,
      continue_edges: Vec<String>,
    ) -> Arc<dyn Node> {
      Arc::new(Self {
        metadata: NodeMetadata {
          id: id.to_string(),
          name: id.to_string(),
          version: "1.0.0".to_string(),
          description: None,
          inputs: vec![],
          outputs: vec![],
          ai_hints: AiHints {
            expected_edges: edges.iter().map(|e| e.to_string()).collect(),
            ..AiHints::default()
          },
          is_loop,
          continue_edges,
        },
        required: required.to_vec(),
      })
    }
  }

  #[async_trait]
  impl Node for StubNode {
    fn metadata(&self) -> &NodeMetadata {
      &self.metadata
    }

    fn validate_config(&self, config: &Value) -> Result<(), Vec<String>> {
      let missing: Vec<String> = self
        .required
        .iter()
        .filter(|key| config.get(**key).is_none())
        .map(|key| format!("missing required parameter '{key}'"))
        .collect();
      if missing.is_empty() { Ok(()) } else { Err(missing) }
    }

    async fn execute(&self, _ctx: &ExecutionContext, _config: &Value) -> Result<EdgeMap, NodeFault> {
      Ok(EdgeMap::value("success", Value::Null))
    }
  }

  fn validator_with(nodes: Vec<Arc<dyn Node>>) -> Validator {
    let registry = Arc::new(NodeRegistry::new());
    for node in nodes {
      registry.register(NodeScope::Server, node).unwrap();
    }
    Validator::new(registry, NodeScope::Server)
  }

  fn document(workflow: Value) -> WorkflowDocument {
    WorkflowDocument::from_value(json!({
      "id": "t", "name": "t", "version": "1.0.0", "workflow": workflow
    }))
    .unwrap()
  }

  #[test]
  fn unknown_node_is_an_error() {
    let validator = validator_with(vec![]);
    let report = validator.validate(&document(json!(["bogus"])));

    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "workflow[0]");
    assert_eq!(report.errors[0].code, IssueCode::UnknownNode);
    assert_eq!(report.errors[0].message, "bogus");
  }

  #[test]
  fn valid_document_passes() {
    let validator = validator_with(vec![
      StubNode::with_edges("log", &["success"]),
      StubNode::with_edges("notify", &["success"]),
    ]);
    let report = validator.validate(&document(json!([
      { "$.author": "Alice" },
      { "log": { "message": "hi", "success?": "notify" } }
    ])));

    assert!(report.valid, "unexpected issues: {report:?}");
    assert!(report.warnings.is_empty());
  }

  #[test]
  fn bad_id_version_and_empty_workflow() {
    let validator = validator_with(vec![]);
    let bad = WorkflowDocument::from_value(json!({
      "id": "not ok", "name": "t", "version": "1.0", "workflow": []
    }))
    .unwrap();
    let report = validator.validate(&bad);

    let codes: Vec<IssueCode> = report.errors.iter().map(|i| i.code).collect();
    assert_eq!(
      codes,
      vec![
        IssueCode::InvalidId,
        IssueCode::InvalidVersion,
        IssueCode::EmptyWorkflow
      ]
    );
  }

  #[test]
  fn undeclared_edge_is_a_warning() {
    let validator = validator_with(vec![
      StubNode::with_edges("log", &["success"]),
      StubNode::with_edges("notify", &["success"]),
    ]);
    let report = validator.validate(&document(json!([
      { "log": { "mystery?": "notify" } }
    ])));

    assert!(report.valid);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].code, IssueCode::UndeclaredEdge);
    assert_eq!(report.warnings[0].path, "workflow[0].mystery?");
  }

  #[test]
  fn handler_nesting_enclosing_step_is_rejected() {
    let validator = validator_with(vec![StubNode::with_edges("auth", &["success"])]);
    let report = validator.validate(&document(json!([
      { "auth": { "success?": { "auth": {} } } }
    ])));

    assert!(!report.valid);
    assert_eq!(report.errors[0].code, IssueCode::StructuralCycle);
  }

  #[test]
  fn loop_without_terminate_edge_warns() {
    let validator = validator_with(vec![StubNode::looping(
      "spin",
      &["do"],
      vec!["do".to_string()],
    )]);
    let report = validator.validate(&document(json!(["spin..."])));

    assert!(report.valid);
    assert_eq!(report.warnings[0].code, IssueCode::MissingTerminateEdge);
  }

  #[test]
  fn node_config_hook_is_invoked() {
    let validator = validator_with(vec![StubNode::build(
      "fetch",
      &["success"],
      &["url"],
      false,
      vec![],
    )]);
    let report = validator.validate(&document(json!([{ "fetch": {} }])));

    assert!(!report.valid);
    assert_eq!(report.errors[0].code, IssueCode::InvalidConfig);
    assert!(report.errors[0].message.contains("url"));
  }

  #[test]
  fn malformed_steps_are_reported() {
    let validator = validator_with(vec![StubNode::with_edges("a", &["success"])]);
    let report = validator.validate(&document(json!([
      { "a": {}, "b": {} },
      { "a": 42 },
      "$.bare"
    ])));

    assert!(!report.valid);
    assert!(report.errors.iter().all(|i| i.code == IssueCode::MalformedStep));
    assert_eq!(report.errors.len(), 3);
  }
}
