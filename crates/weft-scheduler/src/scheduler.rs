//! The scheduler proper.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use weft_engine::{Engine, ExecutionOptions};
use weft_registry::{NodeRegistry, NodeScope};
use weft_store::{
  Automation, AutomationStore, ExecutionRecord, ExecutionStore, TriggerSource, TriggerType,
  WorkflowStore,
};

use crate::error::SchedulerError;
use crate::expression::parse_expression;

/// The store capabilities the scheduler needs, as one bound.
pub trait SchedulerStore: WorkflowStore + ExecutionStore + AutomationStore {}
impl<S: WorkflowStore + ExecutionStore + AutomationStore> SchedulerStore for S {}

/// Outcome of a single fire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
  /// The workflow ran and completed.
  Completed,
  /// The workflow ran and failed; recorded in the execution store.
  Failed,
  /// A previous fire for this automation was still in flight.
  Skipped,
  /// The automation was disabled when the tick landed.
  Disabled,
}

/// Snapshot of one scheduled job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
  pub automation_id: String,
  pub cron_expression: String,
  pub timezone: String,
  pub next_run: Option<DateTime<Utc>>,
  pub is_running: bool,
}

struct Job {
  schedule: Schedule,
  expression: String,
  timezone: Tz,
  cancel: CancellationToken,
}

struct Inner<S> {
  store: Arc<S>,
  engine: Engine,
  jobs: Mutex<HashMap<String, Job>>,
  /// Per-automation singleflight locks; held for the duration of a fire.
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
  /// Cancelled at shutdown: stops the timer loops.
  timers: CancellationToken,
  /// Cancelled only when the drain deadline expires: stops executions.
  executions: CancellationToken,
  tracker: TaskTracker,
  accepting: AtomicBool,
}

/// In-process cron scheduler over a store of automations.
pub struct CronScheduler<S: SchedulerStore + 'static> {
  inner: Arc<Inner<S>>,
}

impl<S: SchedulerStore + 'static> CronScheduler<S> {
  pub fn new(store: Arc<S>, registry: Arc<NodeRegistry>) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        engine: Engine::new(registry, NodeScope::Server),
        jobs: Mutex::new(HashMap::new()),
        locks: Mutex::new(HashMap::new()),
        timers: CancellationToken::new(),
        executions: CancellationToken::new(),
        tracker: TaskTracker::new(),
        accepting: AtomicBool::new(true),
      }),
    }
  }

  /// Load and schedule every enabled cron automation from the store.
  pub async fn start(&self) -> Result<usize, SchedulerError> {
    let automations = self
      .inner
      .store
      .list_automations()
      .await
      .map_err(store_error)?;

    let mut scheduled = 0;
    for automation in automations {
      if automation.enabled && automation.trigger_type == TriggerType::Cron {
        self.schedule(&automation).await?;
        scheduled += 1;
      }
    }
    info!(count = scheduled, "cron scheduler started");
    Ok(scheduled)
  }

  /// Schedule (or replace) the job for an automation.
  ///
  /// Idempotent: scheduling the same automation again stops the previous
  /// timer first and leaves one job in the table.
  pub async fn schedule(&self, automation: &Automation) -> Result<(), SchedulerError> {
    let inner = &self.inner;
    if !inner.accepting.load(Ordering::SeqCst) {
      return Err(SchedulerError::ShuttingDown);
    }

    let expression = automation.trigger_config.cron_expression.clone().ok_or_else(|| {
      SchedulerError::MissingCronExpression {
        automation_id: automation.automation_id.clone(),
      }
    })?;
    let schedule = parse_expression(&expression)?;
    let timezone = timezone_of(automation)?;
    let id = automation.automation_id.clone();

    let cancel = inner.timers.child_token();
    {
      let mut jobs = inner.jobs.lock().await;
      if let Some(existing) = jobs.remove(&id) {
        existing.cancel.cancel();
      }
      jobs.insert(
        id.clone(),
        Job {
          schedule: schedule.clone(),
          expression,
          timezone,
          cancel: cancel.clone(),
        },
      );
    }

    let next = next_tick(&schedule, timezone);
    inner
      .store
      .set_next_run(&id, next)
      .await
      .map_err(store_error)?;
    info!(automation_id = %id, next_run = ?next, "scheduled automation");

    let task_inner = Arc::clone(inner);
    inner
      .tracker
      .spawn(Inner::run_timer(task_inner, id, schedule, timezone, cancel));
    Ok(())
  }

  /// Stop the job for an automation.
  pub async fn unschedule(&self, id: &str) -> Result<(), SchedulerError> {
    let removed = self.inner.jobs.lock().await.remove(id);
    match removed {
      Some(job) => {
        job.cancel.cancel();
        // The automation row may already be gone; losing the next-run
        // timestamp with it is fine.
        if let Err(e) = self.inner.store.set_next_run(id, None).await {
          debug!(automation_id = id, error = %e, "could not clear next run");
        }
        info!(automation_id = id, "unscheduled automation");
        Ok(())
      }
      None => Err(SchedulerError::UnknownAutomation(id.to_string())),
    }
  }

  /// Re-read an automation from the store and replace its job.
  pub async fn reschedule(&self, id: &str) -> Result<(), SchedulerError> {
    let automation = self
      .inner
      .store
      .get_automation(id)
      .await
      .map_err(store_error)?
      .ok_or_else(|| SchedulerError::UnknownAutomation(id.to_string()))?;
    self.schedule(&automation).await
  }

  /// Fire an automation now. Singleflight per automation id.
  pub async fn fire(&self, id: &str) -> Result<FireOutcome, SchedulerError> {
    self.inner.fire(id).await
  }

  /// Snapshot of all jobs, including whether a fire is in flight.
  pub async fn status(&self) -> Vec<JobStatus> {
    let jobs = self.inner.jobs.lock().await;
    let locks = self.inner.locks.lock().await;

    let mut statuses: Vec<JobStatus> = jobs
      .iter()
      .map(|(id, job)| JobStatus {
        automation_id: id.clone(),
        cron_expression: job.expression.clone(),
        timezone: job.timezone.to_string(),
        next_run: next_tick(&job.schedule, job.timezone),
        is_running: locks
          .get(id)
          .map(|lock| lock.try_lock().is_err())
          .unwrap_or(false),
      })
      .collect();
    statuses.sort_by(|a, b| a.automation_id.cmp(&b.automation_id));
    statuses
  }

  /// Stop all timers, reject new fires, and wait for in-flight fires to
  /// drain. Returns `true` when everything drained within the deadline;
  /// otherwise remaining executions are cancelled and `false` is returned.
  pub async fn shutdown(&self, deadline: Duration) -> bool {
    let inner = &self.inner;
    inner.accepting.store(false, Ordering::SeqCst);
    inner.timers.cancel();
    inner.jobs.lock().await.clear();
    inner.tracker.close();

    match tokio::time::timeout(deadline, inner.tracker.wait()).await {
      Ok(()) => {
        info!("cron scheduler drained");
        true
      }
      Err(_) => {
        warn!("drain deadline expired, cancelling in-flight executions");
        inner.executions.cancel();
        false
      }
    }
  }
}

impl<S: SchedulerStore + 'static> Inner<S> {
  async fn run_timer(
    inner: Arc<Inner<S>>,
    id: String,
    schedule: Schedule,
    timezone: Tz,
    cancel: CancellationToken,
  ) {
    loop {
      let Some(next) = next_tick(&schedule, timezone) else {
        warn!(automation_id = %id, "cron schedule has no upcoming ticks");
        break;
      };
      let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel.cancelled() => break,
      }

      // Fire on a separate task so the timer keeps ticking; singleflight
      // skipping happens inside `fire`.
      let fire_inner = Arc::clone(&inner);
      let fire_id = id.clone();
      inner.tracker.spawn(async move {
        match fire_inner.fire(&fire_id).await {
          Ok(outcome) => debug!(automation_id = %fire_id, ?outcome, "cron fire finished"),
          Err(SchedulerError::ShuttingDown) => {}
          Err(e) => error!(automation_id = %fire_id, error = %e, "cron fire failed"),
        }
      });
    }
    debug!(automation_id = %id, "cron timer stopped");
  }

  async fn fire(&self, id: &str) -> Result<FireOutcome, SchedulerError> {
    if !self.accepting.load(Ordering::SeqCst) {
      return Err(SchedulerError::ShuttingDown);
    }

    let lock = {
      let mut locks = self.locks.lock().await;
      Arc::clone(
        locks
          .entry(id.to_string())
          .or_insert_with(|| Arc::new(Mutex::new(()))),
      )
    };
    let Ok(_guard) = lock.try_lock() else {
      debug!(automation_id = id, "previous fire still in flight, skipping tick");
      return Ok(FireOutcome::Skipped);
    };

    // `enabled` is read at fire time, not schedule time: disabling an
    // automation cancels its next run.
    let automation = self
      .store
      .get_automation(id)
      .await
      .map_err(store_error)?
      .ok_or_else(|| SchedulerError::UnknownAutomation(id.to_string()))?;
    if !automation.enabled {
      debug!(automation_id = id, "automation disabled, not firing");
      return Ok(FireOutcome::Disabled);
    }

    let workflow = self
      .store
      .get_workflow(&automation.workflow_id)
      .await
      .map_err(store_error)?
      .ok_or_else(|| SchedulerError::WorkflowNotFound(automation.workflow_id.clone()))?;

    let execution_id = Uuid::new_v4().to_string();
    let mut record = ExecutionRecord::running(&execution_id, &workflow.id, TriggerSource::Cron);
    record.automation_id = Some(id.to_string());
    self
      .store
      .create_execution(&record)
      .await
      .map_err(store_error)?;

    info!(automation_id = id, execution_id = %execution_id, "firing automation");
    let options = ExecutionOptions {
      execution_id: Some(execution_id),
      cancel: self.executions.child_token(),
      ..ExecutionOptions::default()
    };
    let result = self.engine.execute(&workflow, options).await;

    let failed = result.is_err();
    let record = match result {
      Ok(outcome) => record.complete(outcome.state),
      Err(e) => {
        warn!(automation_id = id, error = %e, "automation execution failed");
        record.fail(e.to_string())
      }
    };
    self
      .store
      .update_execution(&record)
      .await
      .map_err(store_error)?;
    self
      .store
      .record_run(id, Utc::now(), failed)
      .await
      .map_err(store_error)?;

    let next = {
      let jobs = self.jobs.lock().await;
      jobs.get(id).and_then(|job| next_tick(&job.schedule, job.timezone))
    };
    if let Some(next) = next {
      self
        .store
        .set_next_run(id, Some(next))
        .await
        .map_err(store_error)?;
    }

    Ok(if failed {
      FireOutcome::Failed
    } else {
      FireOutcome::Completed
    })
  }
}

fn timezone_of(automation: &Automation) -> Result<Tz, SchedulerError> {
  match automation.trigger_config.timezone.as_deref() {
    None => Ok(Tz::UTC),
    Some(name) => name.parse().map_err(|_| SchedulerError::InvalidTimezone {
      timezone: name.to_string(),
    }),
  }
}

fn next_tick(schedule: &Schedule, timezone: Tz) -> Option<DateTime<Utc>> {
  schedule
    .upcoming(timezone)
    .next()
    .map(|tick| tick.with_timezone(&Utc))
}

fn store_error<E: std::error::Error>(e: E) -> SchedulerError {
  SchedulerError::Store(e.to_string())
}
