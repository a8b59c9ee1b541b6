//! The step interpreter.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use weft_node::{ExecutionContext, RuntimeEmitter};
use weft_registry::{NodeRegistry, NodeScope};
use weft_state::StateManager;
use weft_workflow::{HandlerBody, ParsedStep, Step, WorkflowDocument};

use crate::error::EngineError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::outcome::{ExecutionOutcome, TraceEntry};

/// Hard upper bound on dispatches per execution. Loops carry their own
/// iteration guards; this is the engine's termination guarantee when those
/// are misconfigured.
pub const DEFAULT_MAX_DISPATCHES: usize = 100_000;

/// Per-run options supplied by the initiator.
pub struct ExecutionOptions {
  /// Id for this run; generated when absent.
  pub execution_id: Option<String>,
  /// Request-level timeout. On expiry the run's token is cancelled and the
  /// run fails with `TIMEOUT`.
  pub timeout: Option<std::time::Duration>,
  /// Cancellation source. The engine derives a child token per run, so
  /// cancelling this token stops the run without affecting siblings.
  pub cancel: CancellationToken,
  /// Dispatch budget, see [`DEFAULT_MAX_DISPATCHES`].
  pub max_dispatches: usize,
  /// Streaming hooks passed through to nodes.
  pub runtime: Option<Arc<dyn RuntimeEmitter>>,
}

impl Default for ExecutionOptions {
  fn default() -> Self {
    Self {
      execution_id: None,
      timeout: None,
      cancel: CancellationToken::new(),
      max_dispatches: DEFAULT_MAX_DISPATCHES,
      runtime: None,
    }
  }
}

/// Result of running a single node outside a workflow.
#[derive(Debug, Clone)]
pub struct NodeRun {
  pub node_id: String,
  pub edge: String,
  pub data: Value,
  /// State snapshot after the invocation.
  pub state: Value,
  pub duration_ms: u64,
}

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier`: use [`Engine::new`] for a silent
/// engine or [`Engine::with_notifier`] to observe events.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<NodeRegistry>,
  scope: NodeScope,
  notifier: N,
}

/// Mutable state of one run, threaded through the step walk.
struct RunState {
  execution_id: String,
  workflow_id: String,
  state: Arc<StateManager>,
  runtime: Option<Arc<dyn RuntimeEmitter>>,
  cancel: CancellationToken,
  max_dispatches: usize,
  dispatches: usize,
  trace: Vec<TraceEntry>,
  /// Path of the most recently entered step, for timeout/cancel reporting.
  last_path: String,
}

impl Engine<NoopNotifier> {
  /// An engine that discards events.
  pub fn new(registry: Arc<NodeRegistry>, scope: NodeScope) -> Self {
    Self::with_notifier(registry, scope, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Engine<N> {
  pub fn with_notifier(registry: Arc<NodeRegistry>, scope: NodeScope, notifier: N) -> Self {
    Self {
      registry,
      scope,
      notifier,
    }
  }

  /// The scope this engine resolves nodes in.
  pub fn scope(&self) -> NodeScope {
    self.scope
  }

  /// Execute a document and return the final state plus the dispatch trace.
  ///
  /// The document is assumed validated; see the crate docs for what is still
  /// checked at runtime.
  pub async fn execute(
    &self,
    document: &WorkflowDocument,
    options: ExecutionOptions,
  ) -> Result<ExecutionOutcome, EngineError> {
    let execution_id = options
      .execution_id
      .clone()
      .unwrap_or_else(|| Uuid::new_v4().to_string());

    let state = match &document.initial_state {
      Some(initial) => {
        StateManager::with_initial(initial).map_err(|source| EngineError::State {
          path: "initialState".to_string(),
          source,
        })?
      }
      None => StateManager::new(),
    };

    let mut run = RunState {
      execution_id: execution_id.clone(),
      workflow_id: document.id.clone(),
      state: Arc::new(state),
      runtime: options.runtime.clone(),
      cancel: options.cancel.child_token(),
      max_dispatches: options.max_dispatches,
      dispatches: 0,
      trace: Vec::new(),
      last_path: String::new(),
    };

    self.notifier.notify(ExecutionEvent::ExecutionStarted {
      execution_id: execution_id.clone(),
      workflow_id: document.id.clone(),
    });

    let started = Instant::now();
    let result = match options.timeout {
      Some(limit) => {
        match tokio::time::timeout(limit, self.run_top(&mut run, &document.workflow)).await {
          Ok(result) => result,
          Err(_) => {
            // Let in-flight nodes observe the cancellation; the run itself
            // is already over.
            run.cancel.cancel();
            Err(EngineError::Timeout {
              path: run.last_path.clone(),
              elapsed_ms: started.elapsed().as_millis() as u64,
            })
          }
        }
      }
      None => self.run_top(&mut run, &document.workflow).await,
    };

    match result {
      Ok(()) => {
        self.notifier.notify(ExecutionEvent::ExecutionCompleted {
          execution_id: execution_id.clone(),
        });
        Ok(ExecutionOutcome {
          execution_id,
          state: run.state.snapshot(),
          trace: run.trace,
        })
      }
      Err(e) => {
        self.notifier.notify(ExecutionEvent::ExecutionFailed {
          execution_id,
          error: e.to_string(),
        });
        Err(e)
      }
    }
  }

  /// Execute a single node against a supplied config and initial state,
  /// bypassing the step walk. Backs the single-node run surface and the CLI.
  pub async fn execute_node(
    &self,
    node_id: &str,
    config: &Value,
    initial_state: Option<&Map<String, Value>>,
    cancel: CancellationToken,
  ) -> Result<NodeRun, EngineError> {
    let state = match initial_state {
      Some(initial) => {
        StateManager::with_initial(initial).map_err(|source| EngineError::State {
          path: "initialState".to_string(),
          source,
        })?
      }
      None => StateManager::new(),
    };
    let state = Arc::new(state);

    let node = self
      .registry
      .get(self.scope, node_id)
      .ok_or_else(|| EngineError::UnknownNode {
        path: node_id.to_string(),
        node_id: node_id.to_string(),
      })?;

    let interpolated = state.interpolate(config);
    let ctx = ExecutionContext {
      execution_id: Uuid::new_v4().to_string(),
      workflow_id: node_id.to_string(),
      node_id: node_id.to_string(),
      state: Arc::clone(&state),
      inputs: interpolated.value,
      runtime: None,
      cancel,
    };

    let started = Instant::now();
    let result = node.execute(&ctx, &ctx.inputs).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let (edge, data) = match result {
      Ok(edges) => {
        let (edge, producer) = edges.into_single().map_err(|e| EngineError::Protocol {
          path: node_id.to_string(),
          message: e.to_string(),
        })?;
        (edge, producer())
      }
      Err(fault) => (
        "error".to_string(),
        json!({ "code": fault.code, "message": fault.message }),
      ),
    };

    Ok(NodeRun {
      node_id: node_id.to_string(),
      edge,
      data,
      state: state.snapshot(),
      duration_ms,
    })
  }

  /// Walk the top-level sequence, emitting progress at step boundaries.
  async fn run_top(&self, run: &mut RunState, steps: &[Step]) -> Result<(), EngineError> {
    let total = steps.len();
    for (index, step) in steps.iter().enumerate() {
      self.notifier.notify(ExecutionEvent::Progress {
        execution_id: run.execution_id.clone(),
        current: index + 1,
        total,
      });
      self.run_step(run, step, format!("workflow[{index}]")).await?;
    }
    Ok(())
  }

  /// Dispatch one step. Boxed because handlers recurse into nested steps.
  fn run_step<'a>(
    &'a self,
    run: &'a mut RunState,
    step: &'a Step,
    path: String,
  ) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async move {
      run.last_path.clone_from(&path);
      if run.cancel.is_cancelled() {
        return Err(EngineError::Cancelled { path });
      }

      let parsed = step.parse().map_err(|e| EngineError::MalformedStep {
        path: path.clone(),
        message: e.to_string(),
      })?;

      match parsed {
        ParsedStep::StateSet {
          path: state_path,
          value,
        } => self.run_setter(run, state_path, value, path),
        ParsedStep::Node { id, is_loop, config } => {
          let node =
            self
              .registry
              .get(self.scope, id)
              .ok_or_else(|| EngineError::UnknownNode {
                path: path.clone(),
                node_id: id.to_string(),
              })?;
          let metadata = node.metadata();
          let looping = is_loop || metadata.is_loop;

          loop {
            run.dispatches += 1;
            if run.dispatches > run.max_dispatches {
              return Err(EngineError::DispatchBudgetExhausted {
                limit: run.max_dispatches,
              });
            }
            if run.cancel.is_cancelled() {
              return Err(EngineError::Cancelled { path: path.clone() });
            }

            let params = Value::Object(config.params());
            let interpolated = run.state.interpolate(&params);
            if !interpolated.unresolved.is_empty() {
              debug!(
                path = %path,
                unresolved = ?interpolated.unresolved,
                "config kept unresolved state references"
              );
            }

            let ctx = ExecutionContext {
              execution_id: run.execution_id.clone(),
              workflow_id: run.workflow_id.clone(),
              node_id: id.to_string(),
              state: Arc::clone(&run.state),
              inputs: interpolated.value,
              runtime: run.runtime.clone(),
              cancel: run.cancel.clone(),
            };

            self.notifier.notify(ExecutionEvent::StepStarted {
              execution_id: run.execution_id.clone(),
              path: path.clone(),
              node_id: id.to_string(),
            });

            let started = Instant::now();
            let result = node.execute(&ctx, &ctx.inputs).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let (edge, data) = match result {
              Ok(edges) => {
                let (edge, producer) =
                  edges.into_single().map_err(|e| EngineError::Protocol {
                    path: path.clone(),
                    message: e.to_string(),
                  })?;
                (edge, producer())
              }
              Err(fault) => {
                warn!(
                  node_id = id,
                  code = %fault.code,
                  "node fault re-expressed as error edge"
                );
                (
                  "error".to_string(),
                  json!({ "code": fault.code, "message": fault.message }),
                )
              }
            };

            run.trace.push(TraceEntry {
              path: path.clone(),
              node_id: id.to_string(),
              edge: edge.clone(),
              duration_ms,
            });
            self.notifier.notify(ExecutionEvent::StepCompleted {
              execution_id: run.execution_id.clone(),
              path: path.clone(),
              node_id: id.to_string(),
              edge: edge.clone(),
              duration_ms,
            });

            match config.handler(&edge) {
              Some(body) => self.run_handler(run, &edge, body, &path).await?,
              // An error edge nobody handles fails the run.
              None if edge == "error" => {
                let code = data
                  .get("code")
                  .and_then(Value::as_str)
                  .unwrap_or("NODE_ERROR")
                  .to_string();
                let message = data
                  .get("message")
                  .and_then(Value::as_str)
                  .unwrap_or_default()
                  .to_string();
                return Err(EngineError::Unhandled {
                  path: path.clone(),
                  code,
                  message,
                  data,
                });
              }
              None => {}
            }

            if looping && metadata.is_continue_edge(&edge) {
              continue;
            }
            return Ok(());
          }
        }
      }
    })
  }

  /// Write an interpolated value to state and advance.
  fn run_setter(
    &self,
    run: &mut RunState,
    state_path: &str,
    value: &Value,
    path: String,
  ) -> Result<(), EngineError> {
    let started = Instant::now();
    let interpolated = run.state.interpolate(value);
    if !interpolated.unresolved.is_empty() {
      debug!(
        path = %path,
        unresolved = ?interpolated.unresolved,
        "state setter kept unresolved references"
      );
    }
    run
      .state
      .set(state_path, interpolated.value)
      .map_err(|source| EngineError::State {
        path: path.clone(),
        source,
      })?;
    run.trace.push(TraceEntry {
      path,
      node_id: format!("$.{state_path}"),
      edge: "set".to_string(),
      duration_ms: started.elapsed().as_millis() as u64,
    });
    Ok(())
  }

  /// Route an edge into its handler body.
  fn run_handler<'a>(
    &'a self,
    run: &'a mut RunState,
    edge: &'a str,
    body: &'a Value,
    parent: &'a str,
  ) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async move {
      let handler_path = format!("{parent}.{edge}?");
      match HandlerBody::from_value(edge, body) {
        Ok(HandlerBody::Single(nested)) => self.run_step(run, &nested, handler_path).await,
        Ok(HandlerBody::Sequence(steps)) => {
          for (index, nested) in steps.iter().enumerate() {
            self
              .run_step(run, nested, format!("{handler_path}[{index}]"))
              .await?;
          }
          Ok(())
        }
        Err(e) => Err(EngineError::MalformedStep {
          path: handler_path,
          message: e.to_string(),
        }),
      }
    })
  }
}
