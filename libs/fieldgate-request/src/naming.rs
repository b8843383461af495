//! Naming-convention converters.
//!
//! Wire keys are `snake_case`, schema (internal) names are `camelCase`. Every boundary
//! crossing goes through these helpers.

use heck::{ToLowerCamelCase, ToSnakeCase};

/// `country_code` → `countryCode`
#[must_use]
pub fn to_internal(wire: &str) -> String {
    wire.to_lower_camel_case()
}

/// `countryCode` → `country_code`
#[must_use]
pub fn to_wire(internal: &str) -> String {
    internal.to_snake_case()
}

/// Resolve a wire key to its internal name, provided the key survives the round-trip
/// unchanged. `countryCode` or `Country_code` on the wire are rejected.
#[must_use]
pub fn resolve_wire_key(wire: &str) -> Option<String> {
    let internal = to_internal(wire);
    (to_wire(&internal) == wire).then_some(internal)
}

/// Join a wire-level dotted path.
#[must_use]
pub fn join_path(prefix: &str, wire: &str) -> String {
    if prefix.is_empty() {
        wire.to_owned()
    } else {
        format!("{prefix}.{wire}")
    }
}

/// Rewrite every object key of a JSON value into the wire convention.
#[must_use]
pub fn keys_to_wire(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_wire(&k), keys_to_wire(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(keys_to_wire).collect())
        }
        other => other,
    }
}
