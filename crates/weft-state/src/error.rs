use thiserror::Error;

/// Errors from state path operations.
#[derive(Debug, Error)]
pub enum StateError {
  #[error("empty state path")]
  EmptyPath,

  #[error("empty segment in state path '{path}'")]
  EmptySegment { path: String },

  #[error("segment '{segment}' in '{path}' is not an array index")]
  NotAnIndex { path: String, segment: String },

  #[error("array index {index} out of bounds at '{path}' (len {len})")]
  IndexOutOfBounds {
    path: String,
    index: usize,
    len: usize,
  },
}
