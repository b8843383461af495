//! Domain field → table/column mappings.
//!
//! A [`TableMapping`] mirrors the field tree of one domain. Same-table fields read
//! columns of the current alias, one-to-one fields `LEFT JOIN` a child table and
//! one-to-many fields are fetched in a separate round keyed by the parent.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use fieldgate_request::Tree;
use tracing::debug;

use crate::convert::{ToDb, ToDomain, identity_db, identity_domain};
use crate::error::MappingError;

/// SQL expression of a computed field for a table alias and the filter's `data`.
/// `None` when the data cannot produce an expression.
pub type ComputedExpression = fn(&str, &Tree) -> Option<String>;

pub type FieldMappings = BTreeMap<String, FieldMapping>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub primary_key: String,
}

impl TableDef {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub to_db: ToDb,
    pub to_domain: ToDomain,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to_db: identity_db,
            to_domain: identity_domain,
        }
    }

    #[must_use]
    pub fn with_to_db(mut self, to_db: ToDb) -> Self {
        self.to_db = to_db;
        self
    }

    #[must_use]
    pub fn with_to_domain(mut self, to_domain: ToDomain) -> Self {
        self.to_domain = to_domain;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ComputedColumn {
    pub expression: ComputedExpression,
    pub to_db: ToDb,
    pub to_domain: ToDomain,
}

/// `local` is a column of the parent side, `remote` a column of the joined side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub local: String,
    pub remote: String,
}

impl ForeignKey {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

/// Pivot table of a many-to-many relation: `local` references the parent,
/// `remote` references the other table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub name: String,
    pub local: String,
    pub remote: String,
}

impl JoinTable {
    pub fn new(name: impl Into<String>, local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local: local.into(),
            remote: remote.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OneToOne {
    pub child: Arc<TableMapping>,
    pub foreign_key: ForeignKey,
}

/// Relation fetched in its own round.
///
/// Without a join table, `other.{foreign_key.remote} = parent.{foreign_key.local}`.
/// With one, the pivot bridges `parent.{foreign_key.local}` and `other.{foreign_key.remote}`.
pub struct OneToMany {
    pub other_domain: String,
    pub foreign_key: ForeignKey,
    pub join_table: Option<JoinTable>,
    other: OnceLock<Arc<TableMapping>>,
}

impl fmt::Debug for OneToMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the other mapping may point back at us
        f.debug_struct("OneToMany")
            .field("other_domain", &self.other_domain)
            .field("foreign_key", &self.foreign_key)
            .field("join_table", &self.join_table)
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

impl OneToMany {
    pub fn new(other_domain: impl Into<String>, foreign_key: ForeignKey, join_table: Option<JoinTable>) -> Self {
        Self {
            other_domain: other_domain.into(),
            foreign_key,
            join_table,
            other: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.other.get().is_some()
    }

    /// Mapping of the other domain.
    ///
    /// # Errors
    /// `MappingError::UnresolvedRelation` before the registry resolved it.
    pub fn other(&self) -> Result<&Arc<TableMapping>, MappingError> {
        self.other.get().ok_or_else(|| MappingError::UnresolvedRelation {
            domain: self.other_domain.clone(),
        })
    }

    pub(crate) fn resolve(&self, other: Arc<TableMapping>) {
        if self.other.set(other).is_err() {
            debug!(domain = %self.other_domain, "relation already resolved");
        }
    }
}

#[derive(Debug)]
pub enum FieldMapping {
    SameTable(Column),
    SameTableObject(FieldMappings),
    SameTableComputed(ComputedColumn),
    OneToOne(OneToOne),
    OneToMany(OneToMany),
}

impl FieldMapping {
    pub fn column(name: impl Into<String>) -> Self {
        Self::SameTable(Column::new(name))
    }

    pub fn converted(column: Column) -> Self {
        Self::SameTable(column)
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldMapping)>,
        K: Into<String>,
    {
        Self::SameTableObject(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn computed(expression: ComputedExpression) -> Self {
        Self::SameTableComputed(ComputedColumn {
            expression,
            to_db: identity_db,
            to_domain: identity_domain,
        })
    }

    pub fn one_to_one(child: Arc<TableMapping>, foreign_key: ForeignKey) -> Self {
        Self::OneToOne(OneToOne { child, foreign_key })
    }

    pub fn one_to_many(other_domain: impl Into<String>, foreign_key: ForeignKey) -> Self {
        Self::OneToMany(OneToMany::new(other_domain, foreign_key, None))
    }

    pub fn many_to_many(other_domain: impl Into<String>, foreign_key: ForeignKey, join_table: JoinTable) -> Self {
        Self::OneToMany(OneToMany::new(other_domain, foreign_key, Some(join_table)))
    }
}

/// Mapping of one domain onto its root table.
#[derive(Debug)]
#[must_use]
pub struct TableMapping {
    pub table: TableDef,
    pub fields: FieldMappings,
}

impl TableMapping {
    pub fn new(table: TableDef) -> Self {
        Self {
            table,
            fields: FieldMappings::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.get(name)
    }

    /// Every one-to-many relation reachable without leaving this mapping's SQL scope:
    /// through objects and one-to-one children, not through other rounds.
    #[must_use]
    pub fn relations(&self) -> Vec<&OneToMany> {
        let mut out = Vec::new();
        collect_relations(&self.fields, &mut out);
        out
    }
}

fn collect_relations<'a>(fields: &'a FieldMappings, out: &mut Vec<&'a OneToMany>) {
    for field in fields.values() {
        match field {
            FieldMapping::OneToMany(relation) => out.push(relation),
            FieldMapping::SameTableObject(children) => collect_relations(children, out),
            FieldMapping::OneToOne(one) => collect_relations(&one.child.fields, out),
            FieldMapping::SameTable(_) | FieldMapping::SameTableComputed(_) => {}
        }
    }
}
