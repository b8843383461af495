//! Query planning
//!
//! A [`Plan`] is computed for the whole fetch before any SQL runs, so mapping
//! mistakes surface as [`MappingError`] and never half-way through execution.
//!
//! # Aliases
//!
//! - The root table is aliased by its own name.
//! - A one-to-one join or a one-to-many round of field `f` under alias `a` is `a_f`
//!   (field in `snake_case`); pivot tables add `_link`.
//! - Result columns are `f0..fN`, parent keys of one-to-many rounds `__rk0..__rkN`
//!   and the parent reference of a child round `__parent`.
//!
//! # Filters on one-to-many relations
//!
//! Without `use_filter` they restrict the parents through
//! `parent.key IN (SELECT ...)`. With it they are left out of the parent statement
//! and applied to the child round together with its order and page.
//!
//! The restricted values of a selected relation's target always narrow its child round,
//! whatever `use_filter` says.

mod condition;
mod query;

pub use condition::comparison_sql;
pub use query::SelectQuery;

use fieldgate_request::naming;
use fieldgate_request::{
    DomainRequest, FilterEntry, FiltersTree, OrderBy, Options, RelationRestrictions, Requested, RequestableFields,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::convert::ToDomain;
use crate::error::MappingError;
use crate::executor::Row;
use crate::mapping::{FieldMapping, FieldMappings, OneToMany, OneToOne, TableMapping};
use crate::reconstruct::{DomainPath, PathKind, populate};

/// Column alias carrying the parent key in child rounds.
pub const PARENT_KEY: &str = "__parent";

#[derive(Debug, Clone)]
struct LeafColumn {
    alias: String,
    path: DomainPath,
    to_domain: ToDomain,
}

/// Statement of one round plus what is needed to rebuild its rows.
#[derive(Debug)]
pub struct Plan {
    select: SelectQuery,
    leaves: Vec<LeafColumn>,
    relations: Vec<RelationPlan>,
}

impl Plan {
    #[must_use]
    pub fn select(&self) -> &SelectQuery {
        &self.select
    }

    #[must_use]
    pub fn sql(&self) -> String {
        self.select.render(None)
    }

    #[must_use]
    pub fn count_sql(&self) -> String {
        self.select.render_count()
    }

    #[must_use]
    pub fn relations(&self) -> &[RelationPlan] {
        &self.relations
    }

    /// Result object of one row, relations not included.
    #[must_use]
    pub fn build_object(&self, row: &Row) -> Value {
        let mut object = Value::Object(Map::new());
        for leaf in &self.leaves {
            let value = row
                .get(&leaf.alias)
                .filter(|v| !v.is_null())
                .map_or(Value::Null, leaf.to_domain);
            populate(&mut object, &leaf.path, value);
        }
        object
    }
}

/// Child round of one one-to-many field.
#[derive(Debug)]
pub struct RelationPlan {
    path: DomainPath,
    key_alias: String,
    parent_ref: String,
    child: Plan,
}

impl RelationPlan {
    /// Array position inside the parent result object.
    #[must_use]
    pub fn path(&self) -> &DomainPath {
        &self.path
    }

    /// Parent row column holding the correlation key.
    #[must_use]
    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    #[must_use]
    pub fn child(&self) -> &Plan {
        &self.child
    }

    /// Child statement restricted to the parent `keys`, given as SQL literals.
    #[must_use]
    pub fn sql(&self, keys: &[String]) -> String {
        let restriction = format!("{} IN ({})", self.parent_ref, keys.join(", "));
        self.child.select.render(Some(&restriction))
    }
}

/// Plan the root round (and every child round) of `request` against `mapping`.
///
/// Returns `None` when nothing selectable is requested: no SQL has to run at all.
///
/// # Errors
/// Any [`MappingError`] met while walking the request.
pub fn plan(mapping: &TableMapping, request: &DomainRequest) -> Result<Option<Plan>, MappingError> {
    let alias = mapping.table.name.as_str();
    let options = request.options();
    let filters = request.filters();
    let level = Level::root(mapping, alias);
    let mut builder = PlanBuilder::new(alias, alias, Some(options), Some(request.restrictions()));

    builder.project(&level, request.fields(), Some(filters), &DomainPath::root())?;
    if builder.leaves.is_empty() && builder.relations.is_empty() {
        debug!(domain = request.name(), "nothing selectable, no SQL planned");
        return Ok(None);
    }
    builder.project_natural_key(&level, request.natural_key())?;
    builder.restrict(&level, filters)?;
    builder.order(&level, options.orderby.as_ref(), Some(filters), &mapping.table.primary_key)?;
    builder.select.paginate(options.pagination);
    Ok(Some(builder.finish()))
}

/// Field scope inside one statement: a mapping level read through one alias.
struct Level<'m> {
    table: &'m str,
    fields: &'m FieldMappings,
    alias: String,
    prefix: String,
}

impl<'m> Level<'m> {
    fn root(mapping: &'m TableMapping, alias: &str) -> Self {
        Self {
            table: &mapping.table.name,
            fields: &mapping.fields,
            alias: alias.to_owned(),
            prefix: String::new(),
        }
    }

    /// Internal dotted path of `name` from the domain root.
    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.prefix)
        }
    }

    fn get(&self, name: &str) -> Result<&'m FieldMapping, MappingError> {
        self.fields.get(name).ok_or_else(|| MappingError::UnmappedField {
            table: self.table.to_owned(),
            field: self.path(name),
        })
    }

    fn column(&self, name: &str) -> String {
        format!("{}.{name}", self.alias)
    }

    fn object(&self, fields: &'m FieldMappings, name: &str) -> Self {
        Self {
            table: self.table,
            fields,
            alias: self.alias.clone(),
            prefix: self.path(name),
        }
    }

    fn joined(&self, one: &'m OneToOne, alias: String, name: &str) -> Self {
        Self {
            table: &one.child.table.name,
            fields: &one.child.fields,
            alias,
            prefix: self.path(name),
        }
    }

    fn mismatch(&self, name: &str) -> MappingError {
        MappingError::ShapeMismatch {
            table: self.table.to_owned(),
            field: self.path(name),
        }
    }

    fn not_comparable(&self, name: &str) -> MappingError {
        MappingError::NotComparable {
            table: self.table.to_owned(),
            field: self.path(name),
        }
    }
}

fn relation_alias(parent: &str, name: &str) -> String {
    format!("{parent}_{}", naming::to_wire(name))
}

struct PlanBuilder<'r> {
    options: Option<&'r Options>,
    restrictions: Option<&'r RelationRestrictions>,
    select: SelectQuery,
    leaves: Vec<LeafColumn>,
    relations: Vec<RelationPlan>,
}

impl<'r> PlanBuilder<'r> {
    fn new(
        table: &str,
        alias: &str,
        options: Option<&'r Options>,
        restrictions: Option<&'r RelationRestrictions>,
    ) -> Self {
        Self {
            options,
            restrictions,
            select: SelectQuery::new(table, alias),
            leaves: Vec::new(),
            relations: Vec::new(),
        }
    }

    fn finish(self) -> Plan {
        Plan {
            select: self.select,
            leaves: self.leaves,
            relations: self.relations,
        }
    }

    fn filtered_relation(&self, path: &str) -> Option<&'r Options> {
        self.options.and_then(|o| o.filtered_relation(path))
    }

    fn leaf(&mut self, expression: &str, path: DomainPath, to_domain: ToDomain) {
        let alias = format!("f{}", self.leaves.len());
        self.select.project(expression, &alias);
        self.leaves.push(LeafColumn { alias, path, to_domain });
    }

    fn has_leaf(&self, path: &DomainPath) -> bool {
        self.leaves.iter().any(|l| &l.path == path)
    }

    fn join_one_to_one(&mut self, level: &Level<'_>, name: &str, one: &OneToOne) -> String {
        let alias = relation_alias(&level.alias, name);
        self.select.join(
            &alias,
            format!(
                "LEFT JOIN {} AS {alias} ON {alias}.{} = {}",
                one.child.table.name,
                one.foreign_key.remote,
                level.column(&one.foreign_key.local)
            ),
        );
        alias
    }

    /// Join the pivot of `many` when it has one; returns the parent reference column.
    fn link(&mut self, many: &OneToMany, alias: &str) -> String {
        let other_key = format!("{alias}.{}", many.foreign_key.remote);
        match &many.join_table {
            Some(pivot) => {
                let pivot_alias = format!("{alias}_link");
                self.select.join(
                    &pivot_alias,
                    format!(
                        "INNER JOIN {} AS {pivot_alias} ON {pivot_alias}.{} = {other_key}",
                        pivot.name, pivot.remote
                    ),
                );
                format!("{pivot_alias}.{}", pivot.local)
            }
            None => other_key,
        }
    }

    fn project(
        &mut self,
        level: &Level<'_>,
        selection: &RequestableFields,
        filters: Option<&FiltersTree>,
        path: &DomainPath,
    ) -> Result<(), MappingError> {
        for (name, requested) in selection.selected() {
            let nested_filters = filters.and_then(|f| f.find_nested(name));
            match (level.get(name)?, requested) {
                (FieldMapping::SameTable(column), Requested::Flag(_)) => {
                    self.leaf(&level.column(&column.name), path.child(name, PathKind::Value), column.to_domain);
                }
                (FieldMapping::SameTableComputed(computed), Requested::Flag(_)) => {
                    match filters
                        .and_then(|f| f.find_data(name))
                        .and_then(|data| (computed.expression)(&level.alias, data))
                    {
                        Some(expression) => {
                            self.leaf(&expression, path.child(name, PathKind::Value), computed.to_domain);
                        }
                        None => debug!(field = %level.path(name), "computed field has no filter data, skipped"),
                    }
                }
                (FieldMapping::SameTableObject(children), Requested::Nested(sub)) => {
                    self.project(
                        &level.object(children, name),
                        sub,
                        nested_filters,
                        &path.child(name, PathKind::Object),
                    )?;
                }
                (FieldMapping::OneToOne(one), Requested::Nested(sub)) => {
                    let alias = self.join_one_to_one(level, name, one);
                    self.project(
                        &level.joined(one, alias, name),
                        sub,
                        nested_filters,
                        &path.child(name, PathKind::Object),
                    )?;
                }
                (FieldMapping::OneToMany(many), Requested::Nested(sub)) => {
                    self.relation(level, name, many, sub, nested_filters, path)?;
                }
                // composite fields are only ever selected through their children
                (
                    FieldMapping::SameTableObject(_) | FieldMapping::OneToOne(_) | FieldMapping::OneToMany(_),
                    Requested::Flag(_),
                ) => {}
                (FieldMapping::SameTable(_) | FieldMapping::SameTableComputed(_), Requested::Nested(_)) => {
                    return Err(level.mismatch(name));
                }
            }
        }
        Ok(())
    }

    fn relation(
        &mut self,
        level: &Level<'_>,
        name: &str,
        many: &OneToMany,
        selection: &RequestableFields,
        filters: Option<&FiltersTree>,
        path: &DomainPath,
    ) -> Result<(), MappingError> {
        let other = many.other()?;
        let relation_path = level.path(name);
        let options = self.options.and_then(|o| o.relation(&relation_path));
        let filtered = options.filter(|o| o.use_filter);
        let restriction = self.restrictions.and_then(|r| r.get(&relation_path));
        let key_alias = format!("__rk{}", self.relations.len());
        self.select.project(&level.column(&many.foreign_key.local), &key_alias);

        let alias = relation_alias(&level.alias, name);
        let mut child = PlanBuilder::new(&other.table.name, &alias, options, restriction.map(|r| &r.relations));
        let parent_ref = child.link(many, &alias);
        child.select.project(&parent_ref, PARENT_KEY);
        let child_level = Level::root(other, &alias);
        let child_filters = match (filtered.and(filters), restriction) {
            (None, None) => None,
            (requested, restriction) => {
                let mut tree = requested.cloned().unwrap_or_default();
                if let Some(restriction) = restriction {
                    tree.narrow(restriction.filters.clone());
                }
                Some(tree)
            }
        };
        child.project(&child_level, selection, child_filters.as_ref(), &DomainPath::root())?;
        child.project_primary_key(&child_level, &other.table.primary_key);
        if let Some(filters) = &child_filters {
            child.restrict(&child_level, filters)?;
        }
        child.order(
            &child_level,
            filtered.and_then(|o| o.orderby.as_ref()),
            child_filters.as_ref(),
            &other.table.primary_key,
        )?;
        if let Some(options) = filtered {
            child.select.paginate(options.pagination);
        }

        self.relations.push(RelationPlan {
            path: path.child(name, PathKind::Array),
            key_alias,
            parent_ref,
            child: child.finish(),
        });
        Ok(())
    }

    fn project_natural_key(&mut self, level: &Level<'_>, natural_key: &[String]) -> Result<(), MappingError> {
        for field in natural_key {
            let path = DomainPath::root().child(field, PathKind::Value);
            if self.has_leaf(&path) {
                continue;
            }
            let FieldMapping::SameTable(column) = level.get(field)? else {
                return Err(MappingError::InvalidNaturalKey {
                    table: level.table.to_owned(),
                    field: field.clone(),
                });
            };
            self.leaf(&level.column(&column.name), path, column.to_domain);
        }
        Ok(())
    }

    /// Child rows always carry the field mapped on their primary key, when there is one.
    fn project_primary_key(&mut self, level: &Level<'_>, primary_key: &str) {
        let found = level.fields.iter().find_map(|(name, mapping)| match mapping {
            FieldMapping::SameTable(column) if column.name == primary_key => Some((name, column)),
            _ => None,
        });
        if let Some((name, column)) = found {
            let path = DomainPath::root().child(name, PathKind::Value);
            if !self.has_leaf(&path) {
                self.leaf(&level.column(&column.name), path, column.to_domain);
            }
        }
    }

    fn restrict(&mut self, level: &Level<'_>, filters: &FiltersTree) -> Result<(), MappingError> {
        if let Some(condition) = self.condition(level, filters)? {
            self.select.filter(condition);
        }
        Ok(())
    }

    fn condition(&mut self, level: &Level<'_>, tree: &FiltersTree) -> Result<Option<String>, MappingError> {
        let mut parts = Vec::new();
        for entry in &tree.and {
            if let Some(sql) = self.entry_condition(level, entry)? {
                parts.push(sql);
            }
        }
        let mut alternatives = Vec::new();
        for entry in &tree.or {
            if let Some(sql) = self.entry_condition(level, entry)? {
                alternatives.push(sql);
            }
        }
        if alternatives.len() > 1 {
            parts.push(parenthesized(&alternatives, " OR "));
        } else {
            parts.extend(alternatives);
        }
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(parenthesized(&parts, " AND ")),
        })
    }

    fn entry_condition(&mut self, level: &Level<'_>, entry: &FilterEntry) -> Result<Option<String>, MappingError> {
        match entry {
            FilterEntry::Compare { field, comparison } => {
                let sql = match level.get(field)? {
                    FieldMapping::SameTable(column) => {
                        comparison_sql(&level.column(&column.name), comparison, column.to_db)
                    }
                    FieldMapping::SameTableComputed(computed) => comparison
                        .data
                        .as_ref()
                        .and_then(|data| (computed.expression)(&level.alias, data))
                        .and_then(|expression| comparison_sql(&expression, comparison, computed.to_db)),
                    FieldMapping::SameTableObject(_) | FieldMapping::OneToOne(_) | FieldMapping::OneToMany(_) => None,
                };
                sql.map(Some).ok_or_else(|| level.not_comparable(field))
            }
            FilterEntry::Nested { field, filters } => match level.get(field)? {
                FieldMapping::SameTableObject(children) => self.condition(&level.object(children, field), filters),
                FieldMapping::OneToOne(one) => {
                    let alias = self.join_one_to_one(level, field, one);
                    self.condition(&level.joined(one, alias, field), filters)
                }
                FieldMapping::OneToMany(many) => {
                    if self.filtered_relation(&level.path(field)).is_some() {
                        // applied to the child round instead
                        Ok(None)
                    } else {
                        Self::relation_condition(level, field, many, filters)
                    }
                }
                FieldMapping::SameTable(_) | FieldMapping::SameTableComputed(_) => Err(level.mismatch(field)),
            },
            FilterEntry::Group(tree) => self.condition(level, tree),
        }
    }

    /// `parent.key IN (SELECT parent_ref FROM other ... WHERE filters)`.
    fn relation_condition(
        level: &Level<'_>,
        name: &str,
        many: &OneToMany,
        filters: &FiltersTree,
    ) -> Result<Option<String>, MappingError> {
        let other = many.other()?;
        let alias = relation_alias(&level.alias, name);
        let mut sub = PlanBuilder::new(&other.table.name, &alias, None, None);
        let parent_ref = sub.link(many, &alias);
        let Some(condition) = sub.condition(&Level::root(other, &alias), filters)? else {
            return Ok(None);
        };
        sub.select.filter(condition);
        Ok(Some(format!(
            "{} IN ({})",
            level.column(&many.foreign_key.local),
            sub.select.render_subquery(&parent_ref)
        )))
    }

    fn order(
        &mut self,
        level: &Level<'_>,
        orderby: Option<&OrderBy>,
        filters: Option<&FiltersTree>,
        primary_key: &str,
    ) -> Result<(), MappingError> {
        if let Some(orderby) = orderby
            && let Some(expression) = self.order_expression(level, &orderby.field, filters)?
        {
            self.select.order_by(format!("{expression} {}", orderby.sort.as_sql()));
        }
        let tiebreaker = level.column(primary_key);
        if !self.select.is_ordered_by(&tiebreaker) {
            self.select.order_by(format!("{tiebreaker} ASC"));
        }
        Ok(())
    }

    fn order_expression(
        &mut self,
        level: &Level<'_>,
        field: &str,
        filters: Option<&FiltersTree>,
    ) -> Result<Option<String>, MappingError> {
        let (head, rest) = match field.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (field, None),
        };
        let nested_filters = filters.and_then(|f| f.find_nested(head));
        match (level.get(head)?, rest) {
            (FieldMapping::SameTable(column), None) => Ok(Some(level.column(&column.name))),
            (FieldMapping::SameTableComputed(computed), None) => Ok(filters
                .and_then(|f| f.find_data(head))
                .and_then(|data| (computed.expression)(&level.alias, data))),
            (FieldMapping::SameTableObject(children), Some(rest)) => {
                self.order_expression(&level.object(children, head), rest, nested_filters)
            }
            (FieldMapping::OneToOne(one), Some(rest)) => {
                let alias = self.join_one_to_one(level, head, one);
                self.order_expression(&level.joined(one, alias, head), rest, nested_filters)
            }
            _ => Err(level.mismatch(head)),
        }
    }
}

fn parenthesized(parts: &[String], separator: &str) -> String {
    parts
        .iter()
        .map(|p| format!("({p})"))
        .collect::<Vec<_>>()
        .join(separator)
}
