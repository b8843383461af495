//! Sanitized filter model.
//!
//! A `FiltersTree` means `(AND of and) AND (OR of or)`; an empty `or` list adds no
//! constraint. Entries only ever hold validated comparisons, never raw input.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::naming;
use crate::tree::{Scalar, Tree};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterThanOrEquals,
    LesserThan,
    LesserThanOrEquals,
    Between,
    Contains,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Equals,
        Operator::GreaterThan,
        Operator::GreaterThanOrEquals,
        Operator::LesserThan,
        Operator::LesserThanOrEquals,
        Operator::Between,
        Operator::Contains,
    ];

    /// Internal (camelCase) name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEquals => "greaterThanOrEquals",
            Operator::LesserThan => "lesserThan",
            Operator::LesserThanOrEquals => "lesserThanOrEquals",
            Operator::Between => "between",
            Operator::Contains => "contains",
        }
    }

    /// Accepts both the wire (`greater_than`) and the internal (`greaterThan`) spelling.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let internal = naming::to_internal(name);
        Self::ALL.into_iter().find(|op| op.as_str() == internal)
    }

    #[must_use]
    pub fn is_range(self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanOrEquals
                | Operator::LesserThan
                | Operator::LesserThanOrEquals
                | Operator::Between
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&naming::to_wire(self.as_str()))
    }
}

/// Validated right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum ComparisonValue {
    Single(Scalar),
    /// `equals` over a list of values, or the two bounds of `between`.
    List(Vec<Scalar>),
}

impl ComparisonValue {
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            ComparisonValue::Single(s) => s.to_json(),
            ComparisonValue::List(items) => Value::Array(items.iter().map(Scalar::to_json).collect()),
        }
    }

    /// Every scalar carried by this value.
    #[must_use]
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            ComparisonValue::Single(s) => std::slice::from_ref(s),
            ComparisonValue::List(items) => items,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub operator: Operator,
    pub value: ComparisonValue,
    /// Opaque payload required by computed fields.
    pub data: Option<Tree>,
}

impl Comparison {
    #[must_use]
    pub fn new(operator: Operator, value: ComparisonValue) -> Self {
        Self {
            operator,
            value,
            data: None,
        }
    }

    #[must_use]
    pub fn equals(value: Scalar) -> Self {
        Self::new(Operator::Equals, ComparisonValue::Single(value))
    }

    #[must_use]
    pub fn with_data(mut self, data: Tree) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("operator".into(), Value::String(self.operator.to_string()));
        map.insert("value".into(), self.value.to_json());
        if let Some(data) = &self.data {
            map.insert("data".into(), naming::keys_to_wire(data.to_json()));
        }
        Value::Object(map)
    }
}

/// One element of an `and`/`or` list.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterEntry {
    /// Comparison on a leaf or computed field (internal name).
    Compare { field: String, comparison: Comparison },
    /// Filters on the children of an object or linked field.
    Nested { field: String, filters: FiltersTree },
    /// Parenthesised sub-tree at the same level.
    Group(FiltersTree),
}

impl FilterEntry {
    pub fn compare(field: impl Into<String>, comparison: Comparison) -> Self {
        FilterEntry::Compare {
            field: field.into(),
            comparison,
        }
    }

    pub fn nested(field: impl Into<String>, filters: FiltersTree) -> Self {
        FilterEntry::Nested {
            field: field.into(),
            filters,
        }
    }

    /// Whether this entry alone guarantees a constraint on `field`.
    #[must_use]
    pub fn constrains(&self, field: &str) -> bool {
        match self {
            FilterEntry::Compare { field: f, .. } => f == field,
            FilterEntry::Nested { .. } => false,
            FilterEntry::Group(tree) => tree.constrains(field),
        }
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            FilterEntry::Compare { field, comparison } => single(field, comparison.to_wire()),
            FilterEntry::Nested { field, filters } => single(field, filters.to_wire()),
            FilterEntry::Group(tree) => tree.to_wire(),
        }
    }
}

fn single(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(naming::to_wire(field), value);
    Value::Object(map)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    And,
    Or,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FiltersTree {
    pub and: Vec<FilterEntry>,
    pub or: Vec<FilterEntry>,
}

impl FiltersTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty()
    }

    pub fn push(&mut self, bucket: Bucket, entry: FilterEntry) {
        match bucket {
            Bucket::And => self.and.push(entry),
            Bucket::Or => self.or.push(entry),
        }
    }

    /// True when every row passing this tree is constrained on `field`: an `and` entry
    /// names it, or the `or` list is non-empty and each alternative names it.
    #[must_use]
    pub fn constrains(&self, field: &str) -> bool {
        self.and.iter().any(|e| e.constrains(field))
            || (!self.or.is_empty() && self.or.iter().all(|e| e.constrains(field)))
    }

    /// First `data` payload attached to a comparison on `field`, searched through groups.
    #[must_use]
    pub fn find_data(&self, field: &str) -> Option<&Tree> {
        self.and.iter().chain(&self.or).find_map(|entry| match entry {
            FilterEntry::Compare { field: f, comparison } if f == field => comparison.data.as_ref(),
            FilterEntry::Group(tree) => tree.find_data(field),
            _ => None,
        })
    }

    /// Nested tree of an object or linked field, searched through groups.
    #[must_use]
    pub fn find_nested(&self, field: &str) -> Option<&FiltersTree> {
        self.and.iter().chain(&self.or).find_map(|entry| match entry {
            FilterEntry::Nested { field: f, filters } if f == field => Some(filters),
            FilterEntry::Group(tree) => tree.find_nested(field),
            _ => None,
        })
    }

    /// Nested tree of `field` in the `and` list, the only place it can be narrowed safely.
    pub fn nested_and_mut(&mut self, field: &str) -> Option<&mut FiltersTree> {
        self.and.iter_mut().find_map(|entry| match entry {
            FilterEntry::Nested { field: f, filters } if f == field => Some(filters),
            _ => None,
        })
    }

    /// AND `other` into this tree. Its `or` list becomes a group when ours is taken.
    pub fn narrow(&mut self, other: FiltersTree) {
        self.and.extend(other.and);
        if other.or.is_empty() {
            return;
        }
        if self.or.is_empty() {
            self.or = other.or;
        } else {
            self.and.push(FilterEntry::Group(FiltersTree {
                and: Vec::new(),
                or: other.or,
            }));
        }
    }

    /// Render back to the wire shape; sanitizing the result yields this tree again.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("and".into(), Value::Array(self.and.iter().map(FilterEntry::to_wire).collect()));
        map.insert("or".into(), Value::Array(self.or.iter().map(FilterEntry::to_wire).collect()));
        Value::Object(map)
    }
}

/// Default restrictions of the one-to-many relations a request selects.
///
/// Keyed by internal dotted relation path, relative to the domain owning the relation.
/// They narrow the child rounds and never the parent rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationRestrictions(BTreeMap<String, RelationRestriction>);

/// Restriction of one relation: its own rows, then the relations below it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationRestriction {
    pub filters: FiltersTree,
    pub relations: RelationRestrictions,
}

impl RelationRestriction {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.relations.is_empty()
    }
}

impl RelationRestrictions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&RelationRestriction> {
        self.0.get(path)
    }

    /// Empty restrictions are not stored.
    pub fn insert(&mut self, path: impl Into<String>, restriction: RelationRestriction) {
        if !restriction.is_empty() {
            self.0.insert(path.into(), restriction);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationRestriction)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
