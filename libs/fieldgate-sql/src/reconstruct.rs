//! Rebuilding nested result objects from flat rows.

use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    Value,
    Object,
    Array,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub kind: PathKind,
}

/// Position of a value inside one result object, e.g. `address(object).city(value)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainPath(Vec<PathSegment>);

impl DomainPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self, name: &str, kind: PathKind) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment {
            name: name.to_owned(),
            kind,
        });
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    #[must_use]
    pub fn dotted(&self) -> String {
        self.0.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".")
    }
}

/// Object at `segments`, creating missing objects on the way.
fn containing<'v>(target: &'v mut Value, segments: &[PathSegment]) -> Option<&'v mut Map<String, Value>> {
    let mut current = target;
    for segment in segments {
        let map = current.as_object_mut()?;
        current = map
            .entry(segment.name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current.as_object_mut()
}

/// Write `value` at `path`, creating intermediate objects.
///
/// Null values leave the leaf absent while still creating its containers.
pub fn populate(target: &mut Value, path: &DomainPath, value: Value) {
    let Some((last, init)) = path.segments().split_last() else {
        return;
    };
    let Some(map) = containing(target, init) else {
        return;
    };
    match last.kind {
        PathKind::Value => {
            if !value.is_null() {
                map.insert(last.name.clone(), value);
            }
        }
        PathKind::Object => {
            map.entry(last.name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        PathKind::Array => {
            map.entry(last.name.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
        }
    }
}

/// Append `item` to the array at `path`, creating it when missing.
pub fn append(target: &mut Value, path: &DomainPath, item: Value) {
    let Some((last, init)) = path.segments().split_last() else {
        return;
    };
    let Some(map) = containing(target, init) else {
        return;
    };
    let slot = map
        .entry(last.name.clone())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = slot {
        items.push(item);
    }
}

/// Correlation key of a parent or child key value. Null never correlates.
///
/// A REAL key and an INTEGER key with the same value share one key (`1.0` and `1`).
#[must_use]
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        // f64 `Display` drops the fraction of integral values
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
