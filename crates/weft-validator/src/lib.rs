//! Static validation of workflow documents.
//!
//! The validator checks a document against the schema and the node registry
//! for the scope that will execute it, before the engine ever sees it.
//! Errors block execution; warnings (undeclared edges, loops without a
//! terminate edge) are forward-compatibility signals and do not.

mod report;
mod validator;

pub use report::{Issue, IssueCode, ValidationReport};
pub use validator::Validator;
