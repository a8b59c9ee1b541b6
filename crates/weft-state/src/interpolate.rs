//! `$.path` interpolation.
//!
//! Two forms are recognised:
//! - a string that is exactly `$.path` resolves to the typed state value at
//!   that path (numbers stay numbers, objects stay objects);
//! - `{{$.path}}` tokens inside a larger string are replaced textually.
//!
//! Resolution is a single left-to-right pass. Substituted values are never
//! re-expanded, and unresolved references are reported back to the caller
//! rather than failing: policy is per-caller.

use serde_json::Value;

use crate::path;

/// Outcome of an interpolation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
  /// The value with all resolvable references substituted.
  pub value: Value,
  /// Every `$.path` reference encountered, in resolution order.
  pub found: Vec<String>,
  /// References that resolved against the state.
  pub replaced: Vec<String>,
  /// References with no value at their path. Left in place textually.
  pub unresolved: Vec<String>,
}

pub(crate) fn interpolate(root: &Value, value: &Value) -> Interpolated {
  let mut report = Interpolated {
    value: Value::Null,
    found: Vec::new(),
    replaced: Vec::new(),
    unresolved: Vec::new(),
  };
  let value = walk(root, value, &mut report);
  report.value = value;
  report
}

fn walk(root: &Value, value: &Value, report: &mut Interpolated) -> Value {
  match value {
    Value::String(s) => interpolate_string(root, s, report),
    Value::Array(items) => Value::Array(items.iter().map(|v| walk(root, v, report)).collect()),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), walk(root, v, report)))
        .collect(),
    ),
    other => other.clone(),
  }
}

fn interpolate_string(root: &Value, s: &str, report: &mut Interpolated) -> Value {
  // Whole-value form: the entire string is a path reference, so the typed
  // state value is spliced in.
  if let Some(state_path) = s.strip_prefix("$.") {
    if !state_path.is_empty() && !s.contains("{{") {
      report.found.push(state_path.to_string());
      return match lookup(root, state_path) {
        Some(found) => {
          report.replaced.push(state_path.to_string());
          found
        }
        None => {
          report.unresolved.push(state_path.to_string());
          Value::String(s.to_string())
        }
      };
    }
  }

  if !s.contains("{{") {
    return Value::String(s.to_string());
  }

  // Embedded form: replace each {{$.path}} token textually.
  let mut out = String::with_capacity(s.len());
  let mut rest = s;
  while let Some(start) = rest.find("{{") {
    let Some(end) = rest[start..].find("}}") else {
      break;
    };
    let end = start + end;
    out.push_str(&rest[..start]);

    let token = &rest[start..end + 2];
    let inner = rest[start + 2..end].trim();
    match inner.strip_prefix("$.").filter(|p| !p.is_empty()) {
      Some(state_path) => {
        report.found.push(state_path.to_string());
        match lookup(root, state_path) {
          Some(found) => {
            report.replaced.push(state_path.to_string());
            out.push_str(&render(&found));
          }
          None => {
            report.unresolved.push(state_path.to_string());
            out.push_str(token);
          }
        }
      }
      // Not our grammar; leave the token untouched.
      None => out.push_str(token),
    }
    rest = &rest[end + 2..];
  }
  out.push_str(rest);
  Value::String(out)
}

fn lookup(root: &Value, state_path: &str) -> Option<Value> {
  let parts = path::segments(state_path).ok()?;
  path::resolve(root, &parts).cloned()
}

/// Textual rendering for embedded substitution.
fn render(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn state() -> Value {
    json!({
      "user": { "name": "Ada", "age": 36 },
      "items": [10, 20],
      "flag": true
    })
  }

  #[test]
  fn whole_value_splice_preserves_types() {
    let report = interpolate(&state(), &json!("$.user.age"));
    assert_eq!(report.value, json!(36));
    assert_eq!(report.replaced, vec!["user.age"]);

    let report = interpolate(&state(), &json!("$.user"));
    assert_eq!(report.value, json!({ "name": "Ada", "age": 36 }));

    let report = interpolate(&state(), &json!("$.flag"));
    assert_eq!(report.value, json!(true));
  }

  #[test]
  fn embedded_tokens_are_textual() {
    let report = interpolate(&state(), &json!("hi {{$.user.name}}, age {{$.user.age}}"));
    assert_eq!(report.value, json!("hi Ada, age 36"));
    assert_eq!(report.replaced, vec!["user.name", "user.age"]);
  }

  #[test]
  fn unresolved_references_are_reported_and_kept() {
    let report = interpolate(&state(), &json!("$.missing.path"));
    assert_eq!(report.value, json!("$.missing.path"));
    assert_eq!(report.unresolved, vec!["missing.path"]);

    let report = interpolate(&state(), &json!("x={{$.nope}}"));
    assert_eq!(report.value, json!("x={{$.nope}}"));
    assert_eq!(report.unresolved, vec!["nope"]);
  }

  #[test]
  fn found_covers_replaced_and_unresolved() {
    let report = interpolate(&state(), &json!("{{$.user.name}} {{$.nope}}"));
    assert_eq!(report.found, vec!["user.name", "nope"]);
    assert_eq!(report.replaced, vec!["user.name"]);
    assert_eq!(report.unresolved, vec!["nope"]);
  }

  #[test]
  fn containers_are_walked() {
    let input = json!({
      "greeting": "hi {{$.user.name}}",
      "age": "$.user.age",
      "list": ["$.items.1", "plain"]
    });
    let report = interpolate(&state(), &input);
    assert_eq!(
      report.value,
      json!({ "greeting": "hi Ada", "age": 36, "list": [20, "plain"] })
    );
  }

  #[test]
  fn substitution_is_single_pass() {
    // The spliced value itself looks like a reference but is not re-expanded.
    let root = json!({ "a": "$.b", "b": 1 });
    let report = interpolate(&root, &json!("$.a"));
    assert_eq!(report.value, json!("$.b"));
  }

  #[test]
  fn non_reference_braces_are_untouched() {
    let report = interpolate(&state(), &json!("{{ other }} stays"));
    assert_eq!(report.value, json!("{{ other }} stays"));
    assert!(report.found.is_empty());
  }
}
