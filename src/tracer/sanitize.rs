//! Payload sanitization for traced request and response data.

use serde_json::Value;

/// Strings longer than this are truncated.
pub const MAX_STRING_CHARS: usize = 200;

/// Arrays longer than this are replaced by a summary string.
pub const MAX_ARRAY_ITEMS: usize = 20;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "key", "authorization"];

fn is_sensitive(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key_lower.contains(s))
}

/// Return a copy of `value` safe to store in the log.
///
/// Fields whose names look like credentials are redacted, long strings are
/// truncated, and large arrays are summarized.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                if is_sensitive(key) {
                    sanitized.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    sanitized.insert(key.clone(), sanitize(value));
                }
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => {
            if arr.len() > MAX_ARRAY_ITEMS {
                Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                Value::Array(arr.iter().map(sanitize).collect())
            }
        }
        Value::String(s) => {
            let chars = s.chars().count();
            if chars > MAX_STRING_CHARS {
                let head: String = s.chars().take(MAX_STRING_CHARS - 3).collect();
                Value::String(format!("{}... ({} chars)", head, chars))
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}
