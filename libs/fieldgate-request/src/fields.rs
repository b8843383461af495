//! Sanitized field selection.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::naming;

/// Selection state of one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requested {
    Flag(bool),
    /// Object or linked field with its own selection.
    Nested(RequestableFields),
}

impl Requested {
    /// A flag set to `true`, or a nested selection with at least one selected descendant.
    #[must_use]
    pub fn is_selected(&self) -> bool {
        match self {
            Requested::Flag(b) => *b,
            Requested::Nested(nested) => nested.any_selected(),
        }
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Requested::Flag(b) => Value::Bool(*b),
            Requested::Nested(nested) => nested.to_wire(),
        }
    }
}

/// Selection mask keyed by internal field name, mirroring the schema shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestableFields(BTreeMap<String, Requested>);

impl RequestableFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, requested: Requested) {
        self.0.insert(name.into(), requested);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Requested> {
        self.0.get(name)
    }

    #[must_use]
    pub fn is_selected(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(Requested::is_selected)
    }

    /// Nested selection of an object or linked field.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&RequestableFields> {
        match self.0.get(name) {
            Some(Requested::Nested(nested)) => Some(nested),
            _ => None,
        }
    }

    #[must_use]
    pub fn any_selected(&self) -> bool {
        self.0.values().any(Requested::is_selected)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requested)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names of the selected fields, in schema order.
    pub fn selected(&self) -> impl Iterator<Item = (&str, &Requested)> {
        self.iter().filter(|(_, r)| r.is_selected())
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (naming::to_wire(k), v.to_wire()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl FromIterator<(String, Requested)> for RequestableFields {
    fn from_iter<I: IntoIterator<Item = (String, Requested)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
