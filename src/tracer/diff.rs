//! Structural comparison of expected and actual JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One point where `actual` deviates from `expected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    /// Values have different JSON types
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    /// Arrays have different lengths
    LengthMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },
    /// Key present in expected but not in actual
    MissingInActual { path: String },
    /// Key present in actual but not in expected
    MissingInExpected { path: String },
    /// Same type, different value
    ValueMismatch {
        path: String,
        expected: Value,
        actual: Value,
    },
}

impl Difference {
    pub fn path(&self) -> &str {
        match self {
            Difference::TypeMismatch { path, .. }
            | Difference::LengthMismatch { path, .. }
            | Difference::MissingInActual { path }
            | Difference::MissingInExpected { path }
            | Difference::ValueMismatch { path, .. } => path,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compare `expected` against `actual` and list every difference.
///
/// Types are compared first. Arrays report a length mismatch and then recurse
/// over the common indices. Objects compare the union of their keys. Anything
/// else is compared by value. Paths start at `$`.
pub fn find_differences(expected: &Value, actual: &Value) -> Vec<Difference> {
    let mut diffs = Vec::new();
    diff_at("$", expected, actual, &mut diffs);
    diffs
}

fn diff_at(path: &str, expected: &Value, actual: &Value, diffs: &mut Vec<Difference>) {
    let (expected_type, actual_type) = (type_name(expected), type_name(actual));
    if expected_type != actual_type {
        diffs.push(Difference::TypeMismatch {
            path: path.to_string(),
            expected: expected_type.to_string(),
            actual: actual_type.to_string(),
        });
        return;
    }

    match (expected, actual) {
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                diffs.push(Difference::LengthMismatch {
                    path: path.to_string(),
                    expected: exp.len(),
                    actual: act.len(),
                });
            }
            for (i, (e, a)) in exp.iter().zip(act.iter()).enumerate() {
                diff_at(&format!("{}[{}]", path, i), e, a, diffs);
            }
        }
        (Value::Object(exp), Value::Object(act)) => {
            for (key, e) in exp {
                let child = format!("{}.{}", path, key);
                match act.get(key) {
                    Some(a) => diff_at(&child, e, a, diffs),
                    None => diffs.push(Difference::MissingInActual { path: child }),
                }
            }
            for key in act.keys().filter(|k| !exp.contains_key(*k)) {
                diffs.push(Difference::MissingInExpected {
                    path: format!("{}.{}", path, key),
                });
            }
        }
        _ => {
            if expected != actual {
                diffs.push(Difference::ValueMismatch {
                    path: path.to_string(),
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
}
