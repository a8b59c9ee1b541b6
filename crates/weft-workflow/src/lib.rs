//! Workflow documents.
//!
//! A workflow is a declarative JSON program: an ordered sequence of steps
//! over a shared state map. This crate owns the wire format — the document
//! envelope, the step grammar (bare refs, `...` loop suffixes, `$.path`
//! state setters, `label?` edge handlers) — and nothing about execution.

mod document;
mod error;
mod step;

pub use document::WorkflowDocument;
pub use error::DocumentError;
pub use step::{HandlerBody, ParsedStep, Step, StepConfig};
