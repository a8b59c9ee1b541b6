//! Workflow execution engine.
//!
//! The [`Engine`] interprets a parsed [`WorkflowDocument`]: it walks the step
//! sequence in order, interpolates configs against the run's state, dispatches
//! each step to the registered node, and routes the returned edge into the
//! step's `label?` handlers. Loop steps re-dispatch in place on their node's
//! continue edges; termination is guaranteed by a per-execution dispatch
//! budget.
//!
//! The engine assumes the document passed validation; runtime checks cover
//! only what a validator cannot see (the exactly-one-edge contract, registry
//! misses from skipped validation, cancellation, timeouts).

mod engine;
mod error;
mod events;
mod outcome;

pub use engine::{Engine, ExecutionOptions, NodeRun};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use outcome::{ExecutionOutcome, TraceEntry};

pub use weft_workflow::WorkflowDocument;
