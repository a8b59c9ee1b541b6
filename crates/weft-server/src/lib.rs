//! The server host: WebSocket sessions over the execution engine.
//!
//! Clients connect to `/ws`, get a `clientId`, and exchange JSON envelopes
//! `{type, payload?, timestamp, clientId?}`. Execution requests run on their
//! own task; progress events stream back in order, followed by exactly one
//! result or error frame per execution.

mod message;
mod server;
mod session;

pub use message::{
  CancelPayload, ChannelPayload, Envelope, ExecuteOptions, ExecutePayload, ValidatePayload, kind,
};
pub use server::{ServerConfig, ServerError, router, serve};
pub use session::SessionManager;
