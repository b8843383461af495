//! Stock value converters for column mappings.
//!
//! `to_db` converters run on filter values before they are rendered into SQL,
//! `to_domain` converters run on every value read back.

use fieldgate_request::Scalar;
use serde_json::Value;

/// Converts a domain filter value into its column representation.
pub type ToDb = fn(&Scalar) -> Scalar;

/// Converts a column value read from the database into its domain representation.
pub type ToDomain = fn(&Value) -> Value;

#[must_use]
pub fn identity_db(value: &Scalar) -> Scalar {
    value.clone()
}

#[must_use]
pub fn identity_domain(value: &Value) -> Value {
    value.clone()
}

/// `true`/`false` stored as `1`/`0`.
#[must_use]
pub fn bool_to_int(value: &Scalar) -> Scalar {
    match value {
        Scalar::Bool(b) => Scalar::Number(if *b { 1.0 } else { 0.0 }),
        other => other.clone(),
    }
}

/// Inverse of [`bool_to_int`]; any non-zero integer reads as `true`.
#[must_use]
pub fn int_to_bool(value: &Value) -> Value {
    match value.as_i64() {
        Some(n) => Value::Bool(n != 0),
        None => value.clone(),
    }
}

/// Columns holding serialized JSON. Unparsable text is passed through.
#[must_use]
pub fn json_text(value: &Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}
