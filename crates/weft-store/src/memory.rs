//! In-memory store, the synchronisation point for single-process hosts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use weft_workflow::WorkflowDocument;

use crate::types::{Automation, ExecutionRecord};
use crate::{AutomationStore, ExecutionStore, WorkflowStore};

/// Errors from the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
  #[error("{kind} '{id}' not found")]
  NotFound { kind: &'static str, id: String },
}

/// An in-memory implementation of all three store traits.
///
/// Records are cloned out; concurrent executions coordinate only through
/// these maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
  workflows: RwLock<HashMap<String, WorkflowDocument>>,
  executions: RwLock<HashMap<String, ExecutionRecord>>,
  automations: RwLock<HashMap<String, Automation>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl WorkflowStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowDocument>, Self::Error> {
    Ok(self.workflows.read().await.get(id).cloned())
  }

  async fn put_workflow(&self, document: WorkflowDocument) -> Result<(), Self::Error> {
    self
      .workflows
      .write()
      .await
      .insert(document.id.clone(), document);
    Ok(())
  }

  async fn list_workflows(&self) -> Result<Vec<WorkflowDocument>, Self::Error> {
    let mut all: Vec<WorkflowDocument> = self.workflows.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(all)
  }
}

impl ExecutionStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), Self::Error> {
    self
      .executions
      .write()
      .await
      .insert(record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), Self::Error> {
    let mut executions = self.executions.write().await;
    if !executions.contains_key(&record.execution_id) {
      return Err(MemoryStoreError::NotFound {
        kind: "execution",
        id: record.execution_id.clone(),
      });
    }
    executions.insert(record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<Option<ExecutionRecord>, Self::Error> {
    Ok(self.executions.read().await.get(execution_id).cloned())
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Self::Error> {
    let mut matching: Vec<ExecutionRecord> = self
      .executions
      .read()
      .await
      .values()
      .filter(|record| record.workflow_id == workflow_id)
      .cloned()
      .collect();
    matching.sort_by_key(|record| record.started_at);
    Ok(matching)
  }
}

impl AutomationStore for MemoryStore {
  type Error = MemoryStoreError;

  async fn get_automation(&self, id: &str) -> Result<Option<Automation>, Self::Error> {
    Ok(self.automations.read().await.get(id).cloned())
  }

  async fn put_automation(&self, automation: Automation) -> Result<(), Self::Error> {
    self
      .automations
      .write()
      .await
      .insert(automation.automation_id.clone(), automation);
    Ok(())
  }

  async fn list_automations(&self) -> Result<Vec<Automation>, Self::Error> {
    let mut all: Vec<Automation> = self.automations.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.automation_id.cmp(&b.automation_id));
    Ok(all)
  }

  async fn set_next_run(
    &self,
    id: &str,
    next_run_at: Option<DateTime<Utc>>,
  ) -> Result<(), Self::Error> {
    let mut automations = self.automations.write().await;
    let automation = automations.get_mut(id).ok_or(MemoryStoreError::NotFound {
      kind: "automation",
      id: id.to_string(),
    })?;
    automation.next_run_at = next_run_at;
    Ok(())
  }

  async fn record_run(
    &self,
    id: &str,
    completed_at: DateTime<Utc>,
    failed: bool,
  ) -> Result<(), Self::Error> {
    let mut automations = self.automations.write().await;
    let automation = automations.get_mut(id).ok_or(MemoryStoreError::NotFound {
      kind: "automation",
      id: id.to_string(),
    })?;
    automation.last_run_at = Some(completed_at);
    automation.run_count += 1;
    if failed {
      automation.failure_count += 1;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::TriggerSource;
  use serde_json::json;

  fn document(id: &str) -> WorkflowDocument {
    WorkflowDocument::from_value(json!({
      "id": id, "name": id, "version": "1.0.0", "workflow": ["log"]
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn workflows_round_trip() {
    let store = MemoryStore::new();
    store.put_workflow(document("a")).await.unwrap();
    store.put_workflow(document("b")).await.unwrap();

    assert_eq!(store.get_workflow("a").await.unwrap().unwrap().id, "a");
    assert!(store.get_workflow("missing").await.unwrap().is_none());
    let ids: Vec<String> = store
      .list_workflows()
      .await
      .unwrap()
      .into_iter()
      .map(|d| d.id)
      .collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn execution_lifecycle() {
    let store = MemoryStore::new();
    let record = ExecutionRecord::running("e1", "wf", TriggerSource::Cron);
    store.create_execution(&record).await.unwrap();

    let done = record.complete(json!({ "x": 1 }));
    store.update_execution(&done).await.unwrap();

    let fetched = store.get_execution("e1").await.unwrap().unwrap();
    assert_eq!(fetched.status, crate::ExecutionStatus::Completed);
    assert!(fetched.duration_ms().is_some());

    let listed = store.list_executions("wf").await.unwrap();
    assert_eq!(listed.len(), 1);
  }

  #[tokio::test]
  async fn updating_unknown_execution_fails() {
    let store = MemoryStore::new();
    let record = ExecutionRecord::running("ghost", "wf", TriggerSource::Manual);
    assert!(store.update_execution(&record).await.is_err());
  }

  #[tokio::test]
  async fn automation_bookkeeping() {
    let store = MemoryStore::new();
    store
      .put_automation(Automation::cron("a1", "wf", "0 * * * * *"))
      .await
      .unwrap();

    let now = Utc::now();
    store.set_next_run("a1", Some(now)).await.unwrap();
    store.record_run("a1", now, false).await.unwrap();
    store.record_run("a1", now, true).await.unwrap();

    let automation = store.get_automation("a1").await.unwrap().unwrap();
    assert_eq!(automation.next_run_at, Some(now));
    assert_eq!(automation.run_count, 2);
    assert_eq!(automation.failure_count, 1);
  }
}
