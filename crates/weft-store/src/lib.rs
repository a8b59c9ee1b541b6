//! Store traits for weft's persistence collaborators.
//!
//! Persistence of workflow documents, execution history, and automations is
//! external to the engine; these traits are the seam. The in-memory
//! implementations back tests, the CLI, and single-process serving.

mod memory;
mod types;

pub use memory::MemoryStore;
pub use types::{
  Automation, ExecutionRecord, ExecutionStatus, TriggerConfig, TriggerSource, TriggerType,
};

use std::future::Future;

use chrono::{DateTime, Utc};
use weft_workflow::WorkflowDocument;

/// Storage of workflow documents, keyed by document id.
pub trait WorkflowStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_workflow(
    &self,
    id: &str,
  ) -> impl Future<Output = Result<Option<WorkflowDocument>, Self::Error>> + Send;

  fn put_workflow(
    &self,
    document: WorkflowDocument,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn list_workflows(&self)
  -> impl Future<Output = Result<Vec<WorkflowDocument>, Self::Error>> + Send;
}

/// Storage of execution records, keyed by execution id.
pub trait ExecutionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create_execution(
    &self,
    record: &ExecutionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Replace an existing record (status transitions, completion data).
  fn update_execution(
    &self,
    record: &ExecutionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn get_execution(
    &self,
    execution_id: &str,
  ) -> impl Future<Output = Result<Option<ExecutionRecord>, Self::Error>> + Send;

  fn list_executions(
    &self,
    workflow_id: &str,
  ) -> impl Future<Output = Result<Vec<ExecutionRecord>, Self::Error>> + Send;
}

/// Storage of automations, keyed by automation id.
pub trait AutomationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_automation(
    &self,
    id: &str,
  ) -> impl Future<Output = Result<Option<Automation>, Self::Error>> + Send;

  fn put_automation(
    &self,
    automation: Automation,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  fn list_automations(&self) -> impl Future<Output = Result<Vec<Automation>, Self::Error>> + Send;

  /// Persist the next scheduled fire time.
  fn set_next_run(
    &self,
    id: &str,
    next_run_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;

  /// Record a completed fire: bumps `run_count` (and `failure_count` when
  /// `failed`) and sets `last_run_at`.
  fn record_run(
    &self,
    id: &str,
    completed_at: DateTime<Utc>,
    failed: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
