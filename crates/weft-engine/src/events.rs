//! Execution events and notifiers for observability.
//!
//! Events are emitted while a workflow runs so initiators can observe
//! progress, persist history, or stream frames to clients. The engine calls
//! `notify` synchronously between suspension points; implementations decide
//! what to do with each event.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during one workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// The run has started.
  ExecutionStarted {
    execution_id: String,
    workflow_id: String,
  },

  /// A top-level step boundary was reached.
  Progress {
    execution_id: String,
    current: usize,
    total: usize,
  },

  /// A node is about to execute.
  StepStarted {
    execution_id: String,
    path: String,
    node_id: String,
  },

  /// A node returned an edge.
  StepCompleted {
    execution_id: String,
    path: String,
    node_id: String,
    edge: String,
    duration_ms: u64,
  },

  /// The run finished with a final state.
  ExecutionCompleted { execution_id: String },

  /// The run failed.
  ExecutionFailed { execution_id: String, error: String },
}

/// Trait for receiving execution events.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
///
/// The default for one-shot executions (CLI, cron) and for tests.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Used when events are consumed asynchronously, e.g. streamed over a
/// WebSocket session. Unbounded so a slow consumer never blocks the engine;
/// volume is one event per step boundary, so growth is not a concern.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may already be gone; that is the consumer's choice.
    let _ = self.sender.send(event);
  }
}
