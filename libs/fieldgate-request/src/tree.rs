//! Untrusted input trees.
//!
//! Callers hand the engine a JSON-like tree (`fields`, `filters`, `options`). Nothing in it
//! is trusted: every access goes through the explicit variants below, and every piece that
//! survives sanitization is re-typed into the request model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single leaf value of an input tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Convert a JSON value into a scalar. Objects and arrays have no scalar form.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Scalar::Null),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Scalar::Number),
            serde_json::Value::String(s) => Some(Scalar::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null => serde_json::Value::Null,
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Number(n) => number_to_json(*n),
            Scalar::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Short type label used in validation messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
        }
    }
}

/// Whole numbers stay integers on the way out so ids do not turn into `1.0`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_to_json(n: f64) -> serde_json::Value {
    const SAFE_INT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < SAFE_INT {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(_) => write!(f, "{}", self.to_json()),
            Scalar::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

/// Recursive input container: a leaf, a string-keyed object, or an array.
///
/// `BoolTree` (field selection) and the filter/option trees are all carried as `Tree`;
/// the sanitizers decide which shapes are meaningful where.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tree {
    Leaf(Scalar),
    Object(BTreeMap<String, Tree>),
    Array(Vec<Tree>),
}

/// Field selection input: booleans or nested selections.
pub type BoolTree = Tree;

impl Default for Tree {
    fn default() -> Self {
        Tree::Object(BTreeMap::new())
    }
}

impl Tree {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Tree>> {
        match self {
            Tree::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Tree]> {
        match self {
            Tree::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Tree::Leaf(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_bool)
    }

    /// Look up a key when this tree is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Tree> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// True for an empty object, an empty array or a `null` leaf.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Tree::Leaf(s) => s.is_null(),
            Tree::Object(map) => map.is_empty(),
            Tree::Array(items) => items.is_empty(),
        }
    }

    /// Build an object tree from `(key, value)` pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Tree)>,
    {
        Tree::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Tree::Leaf(s) => s.to_json(),
            Tree::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Tree::Array(items) => serde_json::Value::Array(items.iter().map(Tree::to_json).collect()),
        }
    }
}

impl From<Scalar> for Tree {
    fn from(value: Scalar) -> Self {
        Tree::Leaf(value)
    }
}

impl From<bool> for Tree {
    fn from(value: bool) -> Self {
        Tree::Leaf(Scalar::Bool(value))
    }
}

impl From<&str> for Tree {
    fn from(value: &str) -> Self {
        Tree::Leaf(Scalar::from(value))
    }
}

impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        Tree::from(&value)
    }
}

impl From<&serde_json::Value> for Tree {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => Tree::Array(items.iter().map(Tree::from).collect()),
            serde_json::Value::Object(map) => Tree::Object(
                map.iter().map(|(k, v)| (k.clone(), Tree::from(v))).collect(),
            ),
            scalar => Tree::Leaf(Scalar::from_json(scalar).unwrap_or(Scalar::Null)),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_object_trees() {
        let tree = Tree::from(json!({"fields": {"name": true}, "limit": 10}));
        assert_eq!(tree.get("fields").and_then(|f| f.get("name")).and_then(Tree::as_bool), Some(true));
        assert_eq!(
            tree.get("limit").and_then(Tree::as_scalar).and_then(Scalar::as_f64),
            Some(10.0)
        );
    }

    #[test]
    fn deserializes_untagged_shapes() {
        let tree: Tree = serde_json::from_str(r#"{"a":[1,"x",null,{"b":false}]}"#).unwrap();
        let items = tree.get("a").and_then(Tree::as_array).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], Tree::Leaf(Scalar::Null));
        assert_eq!(items[3].get("b").and_then(Tree::as_bool), Some(false));
    }

    #[test]
    fn whole_numbers_render_as_integers() {
        assert_eq!(Scalar::Number(42.0).to_json(), json!(42));
        assert_eq!(Scalar::Number(1.5).to_json(), json!(1.5));
    }

    #[test]
    fn emptiness() {
        assert!(Tree::empty().is_empty());
        assert!(Tree::Leaf(Scalar::Null).is_empty());
        assert!(!Tree::from(true).is_empty());
    }
}
