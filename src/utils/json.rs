//! Structural comparison of configuration documents.
//!
//! Documents are opaque to the system except at the dedup gate, where two
//! payloads are equal when they decode to the same structure: object key
//! order, whitespace and the integer/float spelling of a number do not count.

use serde_json::Number;
use serde_json::Value;

use crate::Error;
use crate::Result;

/// Decodes raw bytes into a document, rejecting empty or malformed input.
pub fn decode_document(raw: &[u8]) -> Result<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::InvalidInput("empty document".to_string()));
    }
    serde_json::from_slice(raw).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// True when both documents have the same key sets and values at every level.
pub fn structurally_equal(
    a: &Value,
    b: &Value,
) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, value)| right.get(key).is_some_and(|other| structurally_equal(value, other)))
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(x, y)| structurally_equal(x, y))
        }
        (Value::Number(left), Value::Number(right)) => numbers_equal(left, right),
        _ => a == b,
    }
}

fn numbers_equal(
    a: &Number,
    b: &Number,
) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
