//! Pagination, ordering and per-relation options.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::naming;

/// Hard upper bound of a page.
pub const MAX_LIMIT: u64 = 5000;
/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: u64 = 100;

/// Page-size policy applied by the request builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl QueryLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_limit(mut self, limit: u64) -> Self {
        self.max_limit = limit;
        self
    }

    /// Default page, already clamped to `max_limit`.
    #[must_use]
    pub fn default_pagination(&self) -> Pagination {
        Pagination {
            offset: 0,
            limit: self.default_limit.min(self.max_limit),
        }
    }

    /// Floor and clamp a numeric limit to `[0, max_limit]`. Never fails.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn clamp(&self, limit: f64) -> u64 {
        if limit.is_nan() || limit <= 0.0 {
            return 0;
        }
        let max = self.max_limit as f64;
        if limit >= max {
            self.max_limit
        } else {
            limit.floor() as u64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    Asc,
    Desc,
}

impl Sort {
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "asc" => Some(Sort::Asc),
            "desc" => Some(Sort::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Sort::Asc => "ASC",
            Sort::Desc => "DESC",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Asc => write!(f, "asc"),
            Sort::Desc => write!(f, "desc"),
        }
    }
}

/// Ordering on one leaf or computed field, addressed by its internal dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub sort: Sort,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, sort: Sort) -> Self {
        Self {
            field: field.into(),
            sort,
        }
    }

    /// `"address.zip_code desc"`
    #[must_use]
    pub fn to_wire(&self) -> String {
        let path = self
            .field
            .split('.')
            .map(naming::to_wire)
            .collect::<Vec<_>>()
            .join(".");
        format!("{path} {}", self.sort)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub pagination: Pagination,
    pub orderby: Option<OrderBy>,
    /// On a relation: apply its filters, order and page to the child round only.
    pub use_filter: bool,
    /// Nested options of one-to-many relations, keyed by internal dotted path.
    pub relations: BTreeMap<String, Options>,
}

impl Options {
    #[must_use]
    pub fn new(limits: &QueryLimits) -> Self {
        Self {
            pagination: limits.default_pagination(),
            orderby: None,
            use_filter: false,
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn relation(&self, path: &str) -> Option<&Options> {
        self.relations.get(path)
    }

    /// Options of `path` when the caller enabled `use_filter` on it.
    #[must_use]
    pub fn filtered_relation(&self, path: &str) -> Option<&Options> {
        self.relation(path).filter(|o| o.use_filter)
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("offset".into(), Value::from(self.pagination.offset));
        map.insert("limit".into(), Value::from(self.pagination.limit));
        if let Some(order) = &self.orderby {
            map.insert("orderby".into(), Value::String(order.to_wire()));
        }
        if self.use_filter {
            map.insert("use_filter".into(), Value::Bool(true));
        }
        for (path, nested) in &self.relations {
            insert_at_path(&mut map, path, nested.to_wire());
        }
        Value::Object(map)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new(&QueryLimits::default())
    }
}

fn insert_at_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(naming::to_wire(path), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(naming::to_wire(head))
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_at_path(inner, rest, value);
            }
        }
    }
}
