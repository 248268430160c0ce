//! Small helpers for turning loosely-typed client input into bounded strings.

use serde_json::Value;

/// Truncate `s` to at most `max` characters (not bytes).
pub fn clip(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    Some((idx, _)) => s[..idx].to_owned(),
    None => s.to_owned(),
  }
}

/// `Some(clipped)` unless `s` is empty.
pub fn clip_non_empty(s: &str, max: usize) -> Option<String> {
  if s.is_empty() { None } else { Some(clip(s, max)) }
}

/// Coerce a JSON scalar into a bounded string.
///
/// Strings, numbers and booleans are accepted; `null`, empty strings,
/// arrays and objects yield `None`.
pub fn scalar_string(value: Option<&Value>, max: usize) -> Option<String> {
  match value? {
    Value::String(s) => clip_non_empty(s, max),
    Value::Number(n) => Some(clip(&n.to_string(), max)),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}
