//! Dot-path walking over JSON values.
//!
//! Paths are dot-separated: `"a.b.c"` walks objects by key; a numeric
//! segment indexes into an array.

use serde_json::Value;

use crate::error::StateError;

/// Split a path into segments, rejecting empty ones.
pub(crate) fn segments(path: &str) -> Result<Vec<&str>, StateError> {
  if path.is_empty() {
    return Err(StateError::EmptyPath);
  }
  let parts: Vec<&str> = path.split('.').collect();
  if parts.iter().any(|s| s.is_empty()) {
    return Err(StateError::EmptySegment {
      path: path.to_string(),
    });
  }
  Ok(parts)
}

/// Resolve a path against a value, returning a reference to the target.
pub(crate) fn resolve<'a>(root: &'a Value, parts: &[&str]) -> Option<&'a Value> {
  let mut current = root;
  for part in parts {
    current = match current {
      Value::Object(map) => map.get(*part)?,
      Value::Array(items) => {
        let index: usize = part.parse().ok()?;
        items.get(index)?
      }
      _ => return None,
    };
  }
  Some(current)
}

/// Write a value at a path, creating intermediate objects as needed.
///
/// An existing intermediate that is not a container is replaced by an object;
/// the leaf is always replaced. Array writes must land within the array or
/// directly at its end (which appends).
pub(crate) fn write(
  current: &mut Value,
  path: &str,
  parts: &[&str],
  value: Value,
) -> Result<(), StateError> {
  let Some((head, rest)) = parts.split_first() else {
    return Err(StateError::EmptyPath);
  };

  if let Value::Array(items) = current {
    let index: usize = head.parse().map_err(|_| StateError::NotAnIndex {
      path: path.to_string(),
      segment: (*head).to_string(),
    })?;
    if index > items.len() {
      return Err(StateError::IndexOutOfBounds {
        path: path.to_string(),
        index,
        len: items.len(),
      });
    }
    if index == items.len() {
      items.push(Value::Object(Default::default()));
    }
    let slot = &mut items[index];
    return if rest.is_empty() {
      *slot = value;
      Ok(())
    } else {
      write(slot, path, rest, value)
    };
  }

  if !current.is_object() {
    *current = Value::Object(Default::default());
  }
  let Value::Object(map) = current else {
    unreachable!()
  };

  if rest.is_empty() {
    map.insert((*head).to_string(), value);
    return Ok(());
  }
  let slot = map
    .entry((*head).to_string())
    .or_insert_with(|| Value::Object(Default::default()));
  write(slot, path, rest, value)
}

/// Remove the value at a path. Returns the removed value, if any.
pub(crate) fn remove(root: &mut Value, parts: &[&str]) -> Option<Value> {
  let (leaf, prefix) = parts.split_last()?;
  let parent = {
    let mut current = root;
    for part in prefix {
      current = match current {
        Value::Object(map) => map.get_mut(*part)?,
        Value::Array(items) => {
          let index: usize = part.parse().ok()?;
          items.get_mut(index)?
        }
        _ => return None,
      };
    }
    current
  };

  match parent {
    Value::Object(map) => map.remove(*leaf),
    Value::Array(items) => {
      let index: usize = leaf.parse().ok()?;
      if index < items.len() {
        Some(items.remove(index))
      } else {
        None
      }
    }
    _ => None,
  }
}
