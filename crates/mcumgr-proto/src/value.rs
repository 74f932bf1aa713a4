//! Helpers for building and reading the CBOR payload map.
//!
//! The wire payload is always a string-keyed CBOR map (§3). We reuse
//! [`ciborium::Value`] directly as the in-memory representation rather than
//! introducing a parallel enum, since it already distinguishes byte strings
//! from text strings and round-trips the integer/bool/array shapes this
//! protocol needs.

use ciborium::Value;

use crate::errors::CodecError;

/// Build a CBOR map from `(key, value)` pairs, preserving insertion order.
///
/// Key order is not significant on decode (§4.A); any deterministic order is
/// fine to emit.
#[must_use]
pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Value {
    Value::Map(pairs.into_iter().map(|(k, v)| (Value::Text(k.into()), v)).collect())
}

/// Look up `key` in a CBOR map value.
#[must_use]
pub fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.as_map()?.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v)
}

/// Read a required text-string field.
pub fn get_str(value: &Value, key: &str) -> Result<String, CodecError> {
    get(value, key)
        .and_then(Value::as_text)
        .map(str::to_owned)
        .ok_or_else(|| missing(key, "text string"))
}

/// Read an optional text-string field.
#[must_use]
pub fn get_str_opt(value: &Value, key: &str) -> Option<String> {
    get(value, key).and_then(Value::as_text).map(str::to_owned)
}

/// Read a required byte-string field.
pub fn get_bytes(value: &Value, key: &str) -> Result<Vec<u8>, CodecError> {
    get(value, key)
        .and_then(Value::as_bytes)
        .map(Vec::clone)
        .ok_or_else(|| missing(key, "byte string"))
}

/// Read an optional byte-string field.
#[must_use]
pub fn get_bytes_opt(value: &Value, key: &str) -> Option<Vec<u8>> {
    get(value, key).and_then(Value::as_bytes).map(Vec::clone)
}

/// Read a required unsigned-integer field.
pub fn get_u64(value: &Value, key: &str) -> Result<u64, CodecError> {
    get(value, key)
        .and_then(ciborium::Value::as_integer)
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| missing(key, "unsigned integer"))
}

/// Read an optional unsigned-integer field.
#[must_use]
pub fn get_u64_opt(value: &Value, key: &str) -> Option<u64> {
    get(value, key).and_then(ciborium::Value::as_integer).and_then(|i| u64::try_from(i).ok())
}

/// Read a signed-integer field (used for `rc`, which may be negative).
#[must_use]
pub fn get_i64_opt(value: &Value, key: &str) -> Option<i64> {
    get(value, key).and_then(ciborium::Value::as_integer).and_then(|i| i64::try_from(i).ok())
}

/// Read a required boolean field, defaulting to `false` when absent.
#[must_use]
pub fn get_bool_or(value: &Value, key: &str, default: bool) -> bool {
    get(value, key).and_then(Value::as_bool).unwrap_or(default)
}

/// Read a required array field.
pub fn get_array<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>, CodecError> {
    get(value, key).and_then(Value::as_array).ok_or_else(|| missing(key, "array"))
}

fn missing(key: &str, expected: &str) -> CodecError {
    CodecError::MalformedFrame { reason: format!("missing or mistyped field `{key}`: expected {expected}") }
}
