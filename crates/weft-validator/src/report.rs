use serde::{Deserialize, Serialize};

/// Stable machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
  InvalidId,
  InvalidVersion,
  EmptyWorkflow,
  MalformedStep,
  UnknownNode,
  InvalidConfig,
  BadHandlerKey,
  UndeclaredEdge,
  InvalidStateValue,
  MissingTerminateEdge,
  StructuralCycle,
}

/// One finding, anchored to a document path like `workflow[2].success?[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  pub path: String,
  pub code: IssueCode,
  pub message: String,
}

impl Issue {
  pub fn new(path: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      code,
      message: message.into(),
    }
  }
}

/// The validator's verdict on a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub valid: bool,
  pub errors: Vec<Issue>,
  pub warnings: Vec<Issue>,
}

impl ValidationReport {
  pub(crate) fn error(
    &mut self,
    path: impl Into<String>,
    code: IssueCode,
    message: impl Into<String>,
  ) {
    self.errors.push(Issue::new(path, code, message));
  }

  pub(crate) fn warn(
    &mut self,
    path: impl Into<String>,
    code: IssueCode,
    message: impl Into<String>,
  ) {
    self.warnings.push(Issue::new(path, code, message));
  }

  pub(crate) fn finish(mut self) -> Self {
    self.valid = self.errors.is_empty();
    self
  }
}
