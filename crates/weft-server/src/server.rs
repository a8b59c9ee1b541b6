//! HTTP surface: the `/ws` upgrade endpoint and server wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
  Router,
  extract::{
    State, WebSocketUpgrade,
    ws::{Message, WebSocket},
  },
  response::IntoResponse,
  routing::get,
};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::session::SessionManager;

/// Server host configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub bind_addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum ServerError {
  #[error("server I/O error")]
  Io(#[from] std::io::Error),
}

/// Build the router over a session manager.
pub fn router(manager: Arc<SessionManager>) -> Router {
  Router::new()
    .route("/ws", get(ws_handler))
    .route("/health", get(health))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(manager)
}

/// Bind and serve until the token is cancelled.
pub async fn serve(
  config: ServerConfig,
  manager: Arc<SessionManager>,
  shutdown: CancellationToken,
) -> Result<(), ServerError> {
  let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
  info!(bind_addr = %config.bind_addr, "server listening");

  axum::serve(listener, router(manager))
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
  Ok(())
}

async fn health() -> &'static str {
  "ok"
}

async fn ws_handler(
  State(manager): State<Arc<SessionManager>>,
  ws: WebSocketUpgrade,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(manager, socket))
}

async fn handle_socket(manager: Arc<SessionManager>, socket: WebSocket) {
  let (mut sink, mut stream) = socket.split();
  let (client_id, mut outbound) = manager.register_client().await;

  // Writer task: one sender per socket keeps outbound frames ordered.
  let writer = tokio::spawn(async move {
    while let Some(envelope) = outbound.recv().await {
      let Ok(text) = serde_json::to_string(&envelope) else {
        continue;
      };
      if sink.send(Message::Text(text)).await.is_err() {
        break;
      }
    }
  });

  while let Some(frame) = stream.next().await {
    match frame {
      Ok(Message::Text(text)) => manager.handle_message(&client_id, &text).await,
      Ok(Message::Close(_)) | Err(_) => break,
      // Protocol-level ping/pong is answered by the websocket layer.
      Ok(_) => {}
    }
  }

  manager.disconnect(&client_id).await;
  writer.abort();
}
