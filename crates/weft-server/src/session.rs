//! The session manager: client table, subscriptions, message dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use weft_engine::{ChannelNotifier, Engine, ExecutionEvent, ExecutionOptions};
use weft_node::{RuntimeEmitter, RuntimeEvent};
use weft_registry::{NodeRegistry, NodeScope};
use weft_validator::Validator;
use weft_workflow::WorkflowDocument;

use crate::message::{
  CancelPayload, ChannelPayload, Envelope, ExecutePayload, ValidatePayload, kind,
};

struct ClientSession {
  sender: mpsc::UnboundedSender<Envelope>,
  subscriptions: HashSet<String>,
  connected_at: DateTime<Utc>,
}

struct RunningExecution {
  client_id: String,
  cancel: CancellationToken,
}

/// Forwards a node's streaming output to the initiating client as
/// `stream_chunk` / `stream_complete` / `stream_error` frames. The engine
/// never touches these; the node owns its own streaming task.
struct SessionRuntime {
  sender: mpsc::UnboundedSender<Envelope>,
  execution_id: String,
}

impl RuntimeEmitter for SessionRuntime {
  fn emit(&self, event: RuntimeEvent) {
    let kind = match &event {
      RuntimeEvent::StreamChunk { .. } => "stream_chunk",
      RuntimeEvent::StreamComplete { .. } => "stream_complete",
      RuntimeEvent::StreamError { .. } => "stream_error",
    };
    let payload = json!({
      "executionId": self.execution_id,
      "event": serde_json::to_value(&event).unwrap_or(Value::Null),
    });
    let _ = self.sender.send(Envelope::new(kind, payload));
  }
}

/// Owns `{clientId -> session}` plus the in-flight execution table, and
/// dispatches incoming envelopes by type.
///
/// Messages from one socket are processed in arrival order; replies for a
/// given execution preserve `progress* -> (result | error)`.
pub struct SessionManager {
  registry: Arc<NodeRegistry>,
  scope: NodeScope,
  clients: RwLock<HashMap<String, ClientSession>>,
  executions: Mutex<HashMap<String, RunningExecution>>,
}

impl SessionManager {
  pub fn new(registry: Arc<NodeRegistry>, scope: NodeScope) -> Self {
    Self {
      registry,
      scope,
      clients: RwLock::new(HashMap::new()),
      executions: Mutex::new(HashMap::new()),
    }
  }

  /// Register a new client and hand back its id and outbound frame stream.
  ///
  /// The first frame on the stream is `connected` carrying the assigned id.
  pub async fn register_client(&self) -> (String, mpsc::UnboundedReceiver<Envelope>) {
    let client_id = Uuid::new_v4().to_string();
    let (sender, receiver) = mpsc::unbounded_channel();

    let mut hello = Envelope::new(kind::CONNECTED, json!({ "clientId": client_id }));
    hello.client_id = Some(client_id.clone());
    let _ = sender.send(hello);

    self.clients.write().await.insert(
      client_id.clone(),
      ClientSession {
        sender,
        subscriptions: HashSet::new(),
        connected_at: Utc::now(),
      },
    );
    info!(client_id = %client_id, "client connected");
    (client_id, receiver)
  }

  /// Drop a client and cancel its in-flight executions.
  pub async fn disconnect(&self, client_id: &str) {
    if let Some(session) = self.clients.write().await.remove(client_id) {
      let connected_for = Utc::now() - session.connected_at;
      info!(
        client_id,
        connected_secs = connected_for.num_seconds(),
        "client disconnected"
      );
    }
    let executions = self.executions.lock().await;
    for (execution_id, running) in executions.iter() {
      if running.client_id == client_id {
        debug!(execution_id, "cancelling execution of disconnected client");
        running.cancel.cancel();
      }
    }
  }

  /// Number of executions currently in flight.
  pub async fn running_executions(&self) -> usize {
    self.executions.lock().await.len()
  }

  /// Process one raw frame from a client.
  pub async fn handle_message(self: &Arc<Self>, client_id: &str, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
      Ok(envelope) => envelope,
      Err(e) => {
        self
          .send_error(client_id, format!("malformed message: {e}"))
          .await;
        return;
      }
    };

    match envelope.kind.as_str() {
      kind::PING => {
        let mut pong = Envelope::new(kind::PONG, envelope.payload.unwrap_or(json!({})));
        pong.client_id = Some(client_id.to_string());
        self.send_to(client_id, pong).await;
      }
      kind::SUBSCRIBE => self.handle_subscription(client_id, &envelope, true).await,
      kind::UNSUBSCRIBE => self.handle_subscription(client_id, &envelope, false).await,
      kind::WORKFLOW_EXECUTE => self.handle_execute(client_id, &envelope).await,
      kind::WORKFLOW_VALIDATE => self.handle_validate(client_id, &envelope).await,
      kind::WORKFLOW_CANCEL => self.handle_cancel(client_id, &envelope).await,
      other => {
        self
          .send_error(client_id, format!("unknown message type '{other}'"))
          .await;
      }
    }
  }

  /// Send a frame to every client subscribed to a channel. The client set
  /// is snapshotted before sending so the lock is not held across sends.
  pub async fn broadcast(&self, channel: &str, envelope: Envelope) -> usize {
    let senders: Vec<mpsc::UnboundedSender<Envelope>> = {
      let clients = self.clients.read().await;
      clients
        .values()
        .filter(|session| session.subscriptions.contains(channel))
        .map(|session| session.sender.clone())
        .collect()
    };

    let mut delivered = 0;
    for sender in senders {
      if sender.send(envelope.clone()).is_ok() {
        delivered += 1;
      }
    }
    delivered
  }

  async fn handle_subscription(&self, client_id: &str, envelope: &Envelope, subscribe: bool) {
    let payload: ChannelPayload = match envelope.parse_payload() {
      Ok(payload) => payload,
      Err(e) => {
        self.send_error(client_id, format!("bad channel payload: {e}")).await;
        return;
      }
    };

    let mut clients = self.clients.write().await;
    if let Some(session) = clients.get_mut(client_id) {
      if subscribe {
        session.subscriptions.insert(payload.channel);
      } else {
        session.subscriptions.remove(&payload.channel);
      }
    }
  }

  async fn handle_validate(&self, client_id: &str, envelope: &Envelope) {
    let payload: ValidatePayload = match envelope.parse_payload() {
      Ok(payload) => payload,
      Err(e) => {
        self.send_error(client_id, format!("bad validate payload: {e}")).await;
        return;
      }
    };

    let result = match WorkflowDocument::from_value(payload.workflow_definition) {
      Ok(document) => {
        let validator = Validator::new(Arc::clone(&self.registry), self.scope);
        serde_json::to_value(validator.validate(&document)).unwrap_or(Value::Null)
      }
      Err(e) => json!({
        "valid": false,
        "errors": [ { "path": "", "code": "MALFORMED_DOCUMENT", "message": e.to_string() } ],
        "warnings": []
      }),
    };

    self
      .send_to(
        client_id,
        Envelope::new(
          kind::WORKFLOW_VALIDATION_RESULT,
          json!({ "validationId": payload.validation_id, "result": result }),
        ),
      )
      .await;
  }

  async fn handle_execute(self: &Arc<Self>, client_id: &str, envelope: &Envelope) {
    let payload: ExecutePayload = match envelope.parse_payload() {
      Ok(payload) => payload,
      Err(e) => {
        self.send_error(client_id, format!("bad execute payload: {e}")).await;
        return;
      }
    };
    let execution_id = payload
      .execution_id
      .clone()
      .unwrap_or_else(|| Uuid::new_v4().to_string());

    let document = match WorkflowDocument::from_value(payload.workflow_definition) {
      Ok(document) => document,
      Err(e) => {
        self
          .send_execution_error(client_id, &execution_id, "invalid workflow document", json!(e.to_string()))
          .await;
        return;
      }
    };

    if !payload.options.skip_validation {
      let validator = Validator::new(Arc::clone(&self.registry), self.scope);
      let report = validator.validate(&document);
      if !report.valid {
        self
          .send_execution_error(
            client_id,
            &execution_id,
            "validation failed",
            serde_json::to_value(&report).unwrap_or(Value::Null),
          )
          .await;
        return;
      }
    }

    let cancel = CancellationToken::new();
    self.executions.lock().await.insert(
      execution_id.clone(),
      RunningExecution {
        client_id: client_id.to_string(),
        cancel: cancel.clone(),
      },
    );

    let manager = Arc::clone(self);
    let client_id = client_id.to_string();
    tokio::spawn(async move {
      manager
        .run_execution(client_id, execution_id, document, payload.options.timeout, cancel)
        .await;
    });
  }

  /// Run one execution, forwarding progress frames, then exactly one result
  /// or error frame.
  async fn run_execution(
    self: Arc<Self>,
    client_id: String,
    execution_id: String,
    document: WorkflowDocument,
    timeout_ms: Option<u64>,
    cancel: CancellationToken,
  ) {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let engine = Engine::with_notifier(
      Arc::clone(&self.registry),
      self.scope,
      ChannelNotifier::new(events_tx),
    );
    let runtime = {
      let clients = self.clients.read().await;
      clients.get(&client_id).map(|session| {
        Arc::new(SessionRuntime {
          sender: session.sender.clone(),
          execution_id: execution_id.clone(),
        }) as Arc<dyn RuntimeEmitter>
      })
    };
    let options = ExecutionOptions {
      execution_id: Some(execution_id.clone()),
      timeout: timeout_ms.map(Duration::from_millis),
      cancel,
      runtime,
      ..ExecutionOptions::default()
    };

    let started = Instant::now();
    let run = tokio::spawn(async move {
      let outcome = engine.execute(&document, options).await;
      // Dropping the engine closes the event channel, letting the forward
      // loop below finish before the final frame is sent.
      drop(engine);
      outcome
    });

    while let Some(event) = events.recv().await {
      if let ExecutionEvent::Progress { current, total, .. } = event {
        self
          .send_to(
            &client_id,
            Envelope::new(
              kind::WORKFLOW_PROGRESS,
              json!({ "executionId": execution_id, "current": current, "total": total }),
            ),
          )
          .await;
      }
    }

    let duration = started.elapsed().as_millis() as u64;
    let result = run.await;
    // Out of the table before the final frame: a client that sees the
    // result must not also see the execution as in flight.
    self.executions.lock().await.remove(&execution_id);

    match result {
      Ok(Ok(outcome)) => {
        self
          .send_to(
            &client_id,
            Envelope::new(
              kind::WORKFLOW_RESULT,
              json!({
                "executionId": execution_id,
                "result": { "state": outcome.state, "trace": outcome.trace },
                "duration": duration
              }),
            ),
          )
          .await;
      }
      Ok(Err(e)) => {
        self
          .send_execution_error(
            &client_id,
            &execution_id,
            e.code(),
            json!({ "message": e.to_string(), "path": e.path() }),
          )
          .await;
      }
      Err(join_error) => {
        warn!(execution_id = %execution_id, error = %join_error, "execution task panicked");
        self
          .send_execution_error(&client_id, &execution_id, "INTERNAL", Value::Null)
          .await;
      }
    }
  }

  async fn handle_cancel(&self, client_id: &str, envelope: &Envelope) {
    let payload: CancelPayload = match envelope.parse_payload() {
      Ok(payload) => payload,
      Err(e) => {
        self.send_error(client_id, format!("bad cancel payload: {e}")).await;
        return;
      }
    };

    let executions = self.executions.lock().await;
    match executions.get(&payload.execution_id) {
      Some(running) => {
        info!(execution_id = %payload.execution_id, "cancellation requested");
        running.cancel.cancel();
      }
      None => {
        debug!(execution_id = %payload.execution_id, "cancel for unknown execution");
      }
    }
  }

  async fn send_to(&self, client_id: &str, envelope: Envelope) {
    let sender = {
      let clients = self.clients.read().await;
      clients.get(client_id).map(|session| session.sender.clone())
    };
    if let Some(sender) = sender {
      // A closed channel means the socket is gone; disconnect cleanup will
      // cancel anything still running.
      let _ = sender.send(envelope);
    }
  }

  async fn send_error(&self, client_id: &str, message: String) {
    warn!(client_id, %message, "protocol error");
    self
      .send_to(client_id, Envelope::new(kind::ERROR, json!({ "message": message })))
      .await;
  }

  async fn send_execution_error(
    &self,
    client_id: &str,
    execution_id: &str,
    error: &str,
    details: Value,
  ) {
    self
      .send_to(
        client_id,
        Envelope::new(
          kind::WORKFLOW_ERROR,
          json!({ "executionId": execution_id, "error": error, "details": details }),
        ),
      )
      .await;
  }
}
