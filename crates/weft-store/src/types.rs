use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of one execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Completed,
  Failed,
}

/// Who asked for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
  Manual,
  Cron,
  WebSocket,
  Http,
}

/// One row of execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub automation_id: Option<String>,
  pub status: ExecutionStatus,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  pub trigger_source: TriggerSource,
  /// Final state snapshot on success.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ExecutionRecord {
  /// A fresh `running` record.
  pub fn running(
    execution_id: impl Into<String>,
    workflow_id: impl Into<String>,
    trigger_source: TriggerSource,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      workflow_id: workflow_id.into(),
      automation_id: None,
      status: ExecutionStatus::Running,
      started_at: Utc::now(),
      completed_at: None,
      trigger_source,
      result: None,
      error: None,
    }
  }

  /// Transition to `completed` with a result.
  pub fn complete(mut self, result: Value) -> Self {
    self.status = ExecutionStatus::Completed;
    self.completed_at = Some(Utc::now());
    self.result = Some(result);
    self
  }

  /// Transition to `failed` with an error message.
  pub fn fail(mut self, error: impl Into<String>) -> Self {
    self.status = ExecutionStatus::Failed;
    self.completed_at = Some(Utc::now());
    self.error = Some(error.into());
    self
  }

  /// Wall-clock duration, once completed.
  pub fn duration_ms(&self) -> Option<i64> {
    self
      .completed_at
      .map(|done| (done - self.started_at).num_milliseconds())
  }
}

/// How an automation is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
  Cron,
  Manual,
  Webhook,
}

/// Trigger parameters for an automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cron_expression: Option<String>,
  /// IANA timezone name; UTC when absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timezone: Option<String>,
}

/// A stored automation: a workflow plus a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
  pub automation_id: String,
  pub workflow_id: String,
  pub enabled: bool,
  pub trigger_type: TriggerType,
  pub trigger_config: TriggerConfig,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next_run_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_run_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub run_count: u64,
  #[serde(default)]
  pub failure_count: u64,
}

impl Automation {
  /// A cron automation with default bookkeeping.
  pub fn cron(
    automation_id: impl Into<String>,
    workflow_id: impl Into<String>,
    cron_expression: impl Into<String>,
  ) -> Self {
    Self {
      automation_id: automation_id.into(),
      workflow_id: workflow_id.into(),
      enabled: true,
      trigger_type: TriggerType::Cron,
      trigger_config: TriggerConfig {
        cron_expression: Some(cron_expression.into()),
        timezone: None,
      },
      next_run_at: None,
      last_run_at: None,
      run_count: 0,
      failure_count: 0,
    }
  }
}
