//! The per-execution state map.

use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::StateError;
use crate::interpolate::{self, Interpolated};
use crate::path;

/// Thread-safe mapping from dot-paths to JSON values.
///
/// One instance is owned by each execution. The internal mutex exists so a
/// node that forks subtasks can share the manager safely; concurrent
/// executions never share an instance.
#[derive(Debug, Default)]
pub struct StateManager {
  root: Mutex<Value>,
}

impl StateManager {
  /// Create an empty state map.
  pub fn new() -> Self {
    Self {
      root: Mutex::new(Value::Object(Map::new())),
    }
  }

  /// Create a state map from initial `path -> value` entries.
  ///
  /// Keys are dot-paths, so `{"a.b": 1}` produces `{"a": {"b": 1}}`.
  pub fn with_initial(initial: &Map<String, Value>) -> Result<Self, StateError> {
    let manager = Self::new();
    for (key, value) in initial {
      manager.set(key, value.clone())?;
    }
    Ok(manager)
  }

  /// Read the value at a path.
  pub fn get(&self, state_path: &str) -> Option<Value> {
    let parts = path::segments(state_path).ok()?;
    let root = self.root.lock().unwrap_or_else(|e| e.into_inner());
    path::resolve(&root, &parts).cloned()
  }

  /// Write a value at a path, creating intermediate objects as needed.
  pub fn set(&self, state_path: &str, value: Value) -> Result<(), StateError> {
    let parts = path::segments(state_path)?;
    let mut root = self.root.lock().unwrap_or_else(|e| e.into_inner());
    path::write(&mut root, state_path, &parts, value)
  }

  /// Remove the value at a path. Returns the removed value, if any.
  pub fn delete(&self, state_path: &str) -> Option<Value> {
    let parts = path::segments(state_path).ok()?;
    let mut root = self.root.lock().unwrap_or_else(|e| e.into_inner());
    path::remove(&mut root, &parts)
  }

  /// Deep-cloned snapshot of the whole state.
  pub fn snapshot(&self) -> Value {
    self.root.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// Resolve `$.path` references in a value against the current state.
  ///
  /// A string that is exactly a `$.`-prefixed path is spliced in as the typed
  /// state value; `{{$.path}}` tokens inside larger strings are substituted
  /// textually. Objects and arrays are walked. Resolution is a single pass:
  /// substituted values are not re-expanded.
  pub fn interpolate(&self, value: &Value) -> Interpolated {
    let root = self.root.lock().unwrap_or_else(|e| e.into_inner());
    interpolate::interpolate(&root, value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn set_and_get_nested() {
    let state = StateManager::new();
    state.set("a.b.c", json!(42)).unwrap();

    assert_eq!(state.get("a.b.c"), Some(json!(42)));
    assert_eq!(state.get("a.b"), Some(json!({ "c": 42 })));
    assert_eq!(state.get("a.missing"), None);
  }

  #[test]
  fn set_replaces_leaf() {
    let state = StateManager::new();
    state.set("x", json!("old")).unwrap();
    state.set("x", json!("new")).unwrap();

    assert_eq!(state.get("x"), Some(json!("new")));
  }

  #[test]
  fn set_replaces_scalar_intermediate() {
    let state = StateManager::new();
    state.set("a", json!(1)).unwrap();
    state.set("a.b", json!(2)).unwrap();

    assert_eq!(state.snapshot(), json!({ "a": { "b": 2 } }));
  }

  #[test]
  fn arrays_are_indexed_numerically() {
    let state = StateManager::new();
    state.set("items", json!(["a", "b", "c"])).unwrap();

    assert_eq!(state.get("items.1"), Some(json!("b")));
    state.set("items.1", json!("B")).unwrap();
    assert_eq!(state.get("items.1"), Some(json!("B")));
  }

  #[test]
  fn array_write_out_of_bounds_fails() {
    let state = StateManager::new();
    state.set("items", json!([1])).unwrap();

    let err = state.set("items.5", json!(2)).unwrap_err();
    assert!(matches!(err, StateError::IndexOutOfBounds { index: 5, .. }));
  }

  #[test]
  fn delete_removes_leaf() {
    let state = StateManager::new();
    state.set("a.b", json!(1)).unwrap();

    assert_eq!(state.delete("a.b"), Some(json!(1)));
    assert_eq!(state.get("a.b"), None);
    assert_eq!(state.get("a"), Some(json!({})));
    assert_eq!(state.delete("a.b"), None);
  }

  #[test]
  fn with_initial_expands_dotted_keys() {
    let mut initial = Map::new();
    initial.insert("user.name".to_string(), json!("Ada"));
    initial.insert("count".to_string(), json!(3));

    let state = StateManager::with_initial(&initial).unwrap();
    assert_eq!(
      state.snapshot(),
      json!({ "user": { "name": "Ada" }, "count": 3 })
    );
  }

  #[test]
  fn empty_path_is_rejected() {
    let state = StateManager::new();
    assert!(matches!(
      state.set("", json!(1)),
      Err(StateError::EmptyPath)
    ));
    assert!(matches!(
      state.set("a..b", json!(1)),
      Err(StateError::EmptySegment { .. })
    ));
  }
}
