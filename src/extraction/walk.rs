//! Depth-bounded traversal over embedded JSON data.
//!
//! Structured-data blobs on commerce pages nest arbitrarily deep and are
//! occasionally adversarial, so every walk carries an explicit depth budget
//! instead of trusting the input.

use serde_json::Value;

/// Visits `value` and every descendant down to `max_depth` levels, calling
/// `visit` on each node. Children beyond the budget are skipped silently.
pub fn walk_json<'a>(value: &'a Value, max_depth: usize, visit: &mut dyn FnMut(&'a Value)) {
    visit(value);
    if max_depth == 0 {
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values() {
                walk_json(child, max_depth - 1, visit);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk_json(child, max_depth - 1, visit);
            }
        }
        _ => {}
    }
}

/// Case-insensitive field lookup on a JSON object. Returns the first value
/// whose key matches any of `names` after lowercasing.
pub fn field<'a>(object: &'a serde_json::Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    for (key, value) in object {
        let key = key.to_lowercase();
        if names.iter().any(|n| *n == key) {
            return Some(value);
        }
    }
    None
}

/// Renders a scalar JSON value as a string; objects, arrays, and null give
/// `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
