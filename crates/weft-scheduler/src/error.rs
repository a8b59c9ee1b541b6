use thiserror::Error;

/// Errors from scheduling and firing automations.
#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error("invalid cron expression '{expression}': {message}")]
  InvalidCronExpression { expression: String, message: String },

  #[error("invalid timezone '{timezone}'")]
  InvalidTimezone { timezone: String },

  #[error("automation '{automation_id}' has no cron expression")]
  MissingCronExpression { automation_id: String },

  #[error("automation '{0}' not found")]
  UnknownAutomation(String),

  #[error("workflow '{0}' not found")]
  WorkflowNotFound(String),

  #[error("store operation failed: {0}")]
  Store(String),

  #[error("scheduler is shutting down")]
  ShuttingDown,
}
