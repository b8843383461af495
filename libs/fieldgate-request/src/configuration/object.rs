use std::collections::BTreeMap;

use super::{Cardinality, FieldConfiguration, OptionScope};
use crate::error::{ConfigError, ErrorContext, InputError};
use crate::fields::{Requested, RequestableFields};
use crate::filter::{Bucket, FilterEntry, FiltersTree, RelationRestrictions};
use crate::naming::{self, join_path};
use crate::options::{OrderBy, Options, QueryLimits, Sort};
use crate::tree::{Scalar, Tree};

/// Fixed set of named children. The root of every domain schema is an `ObjectField`.
#[derive(Debug, Default)]
#[must_use]
pub struct ObjectField {
    fields: BTreeMap<String, FieldConfiguration>,
}

impl ObjectField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child under its internal (camelCase) name.
    pub fn with(mut self, name: impl Into<String>, field: FieldConfiguration) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldConfiguration> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldConfiguration)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a wire key to a child.
    fn lookup(&self, wire: &str) -> Result<(String, &FieldConfiguration), &'static str> {
        let name = naming::resolve_wire_key(wire).ok_or("field name is not in snake_case")?;
        match self.fields.get(&name) {
            Some(field) => Ok((name, field)),
            None => Err("unknown field"),
        }
    }

    // --- selection ---

    /// Sanitize a selection object against every child. Missing keys are unselected.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn sanitize_fields(
        &self,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<RequestableFields, ConfigError> {
        let mut out = RequestableFields::new();
        for (name, field) in &self.fields {
            let wire = naming::to_wire(name);
            let requested = field.sanitize_field(input.get(&wire), &join_path(path, &wire), errors)?;
            out.insert(name.clone(), requested);
        }
        Ok(out)
    }

    /// Selection of every leaf and object below this object; relations stay unselected.
    #[must_use]
    pub fn select_all(&self) -> RequestableFields {
        self.fields
            .iter()
            .map(|(name, field)| {
                let requested = match field {
                    FieldConfiguration::Object(object) => Requested::Nested(object.select_all()),
                    other => Requested::Flag(other.is_selected_by_default()),
                };
                (name.clone(), requested)
            })
            .collect()
    }

    pub(super) fn sanitize_field(
        &self,
        input: Option<&Tree>,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<Requested, ConfigError> {
        match input {
            None | Some(Tree::Leaf(Scalar::Null | Scalar::Bool(false))) => Ok(Requested::Flag(false)),
            Some(Tree::Leaf(Scalar::Bool(true))) => Ok(Requested::Nested(self.select_all())),
            Some(tree @ Tree::Object(_)) => Ok(Requested::Nested(self.sanitize_fields(tree, path, errors)?)),
            Some(_) => {
                errors.push(InputError::selected(path, "expected a boolean or an object"));
                Ok(Requested::Flag(false))
            }
        }
    }

    // --- filters ---

    /// Collect the filters addressed to the children, without default restrictions.
    ///
    /// Direct keys go to `and`; `and`/`or` arrays go to their bucket; an array entry that
    /// carries `and`/`or` itself (or several keys inside `or`) becomes a group.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn collect_filters(
        &self,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<FiltersTree, ConfigError> {
        let mut out = FiltersTree::new();
        self.collect_level(input, &mut out, path, errors)?;
        Ok(out)
    }

    /// Collect the filters, then inject every child's default restriction.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn sanitize_filters(
        &self,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<FiltersTree, ConfigError> {
        let mut out = self.collect_filters(input, path, errors)?;
        self.apply_child_defaults(&mut out);
        Ok(out)
    }

    pub fn apply_child_defaults(&self, out: &mut FiltersTree) {
        for (name, field) in &self.fields {
            field.apply_defaults(name, out);
        }
    }

    fn collect_level(
        &self,
        input: &Tree,
        out: &mut FiltersTree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let Some(map) = input.as_object() else {
            if !input.is_empty() {
                errors.push(InputError::filtering(or_root(path, "filters"), "expected an object"));
            }
            return Ok(());
        };
        for (key, value) in map {
            let bucket = match key.as_str() {
                "and" => Bucket::And,
                "or" => Bucket::Or,
                _ => {
                    self.collect_field(key, value, out, Bucket::And, path, errors)?;
                    continue;
                }
            };
            let Some(items) = value.as_array() else {
                errors.push(InputError::filtering(join_path(path, key), "expected an array"));
                continue;
            };
            for item in items {
                self.collect_entry(item, out, bucket, path, errors)?;
            }
        }
        Ok(())
    }

    fn collect_entry(
        &self,
        item: &Tree,
        out: &mut FiltersTree,
        bucket: Bucket,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let Some(map) = item.as_object() else {
            errors.push(InputError::filtering(or_root(path, "filters"), "expected an object"));
            return Ok(());
        };
        let is_group =
            map.contains_key("and") || map.contains_key("or") || (bucket == Bucket::Or && map.len() > 1);
        if is_group {
            let mut group = FiltersTree::new();
            self.collect_level(item, &mut group, path, errors)?;
            if !group.is_empty() {
                out.push(bucket, FilterEntry::Group(group));
            }
            return Ok(());
        }
        for (key, value) in map {
            self.collect_field(key, value, out, bucket, path, errors)?;
        }
        Ok(())
    }

    fn collect_field(
        &self,
        key: &str,
        value: &Tree,
        out: &mut FiltersTree,
        bucket: Bucket,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        // unknown keys are reported by `find_errors`
        let Ok((name, field)) = self.lookup(key) else {
            return Ok(());
        };
        field.sanitize_filter(&name, value, out, bucket, &join_path(path, key), errors)
    }

    pub(super) fn sanitize_filter(
        &self,
        name: &str,
        input: &Tree,
        out: &mut FiltersTree,
        bucket: Bucket,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let nested = self.collect_filters(input, path, errors)?;
        if !nested.is_empty() {
            out.push(bucket, FilterEntry::nested(name, nested));
        }
        Ok(())
    }

    pub(super) fn apply_defaults(&self, name: &str, out: &mut FiltersTree) {
        if let Some(filters) = out.nested_and_mut(name) {
            self.apply_child_defaults(filters);
            return;
        }
        let mut nested = FiltersTree::new();
        self.apply_child_defaults(&mut nested);
        if !nested.is_empty() {
            out.and.push(FilterEntry::nested(name, nested));
        }
    }

    /// Inject the restrictions of every linked domain `selection` reaches below this object.
    ///
    /// `prefix` is the dotted path of this object from the domain root, empty at the root.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn apply_selection_defaults(
        &self,
        selection: &RequestableFields,
        prefix: &str,
        out: &mut FiltersTree,
        relations: &mut RelationRestrictions,
    ) -> Result<(), ConfigError> {
        for (name, requested) in selection.selected() {
            if let Some(field) = self.fields.get(name) {
                field.apply_selection_defaults(name, &join_path(prefix, name), requested, out, relations)?;
            }
        }
        Ok(())
    }

    // --- options ---

    /// Sanitize the options of a domain, or of a one-to-many relation when nested.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn sanitize_options(
        &self,
        input: &Tree,
        limits: &QueryLimits,
        wire: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<Options, ConfigError> {
        let mut out = Options::new(limits);
        let Some(map) = input.as_object() else {
            if !input.is_empty() {
                errors.push(InputError::option(or_root(wire, "options"), "expected an object"));
            }
            return Ok(out);
        };
        for (key, value) in map {
            let path = join_path(wire, key);
            match key.as_str() {
                "limit" => match value.as_scalar().and_then(Scalar::as_f64) {
                    Some(limit) => out.pagination.limit = limits.clamp(limit),
                    None => errors.push(InputError::option(path, "expected a number")),
                },
                "offset" => match value.as_scalar().and_then(Scalar::as_f64).and_then(to_offset) {
                    Some(offset) => out.pagination.offset = offset,
                    None => errors.push(InputError::option(path, "expected a non-negative number")),
                },
                "orderby" => self.sanitize_orderby(value, &path, &mut out, errors)?,
                "use_filter" => match value.as_bool() {
                    Some(use_filter) => out.use_filter = use_filter,
                    None => errors.push(InputError::option(path, "expected a boolean")),
                },
                _ => match self.lookup(key) {
                    Ok((name, field)) => {
                        let scope = OptionScope {
                            limits,
                            relation: &name,
                            wire: &path,
                        };
                        field.sanitize_option(value, scope, &mut out, errors)?;
                    }
                    Err(reason) => errors.push(InputError::option(path, reason)),
                },
            }
        }
        Ok(out)
    }

    /// Options addressed to relations below this object (`{address: {cities: {...}}}`).
    pub(super) fn sanitize_relation_options(
        &self,
        input: &Tree,
        scope: OptionScope<'_>,
        out: &mut Options,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let Some(map) = input.as_object() else {
            errors.push(InputError::option(scope.wire, "expected an object"));
            return Ok(());
        };
        for (key, value) in map {
            let wire = join_path(scope.wire, key);
            match self.lookup(key) {
                Ok((name, field)) => {
                    let relation = format!("{}.{name}", scope.relation);
                    let nested = OptionScope {
                        limits: scope.limits,
                        relation: &relation,
                        wire: &wire,
                    };
                    field.sanitize_option(value, nested, out, errors)?;
                }
                Err(reason) => errors.push(InputError::option(wire, reason)),
            }
        }
        Ok(())
    }

    fn sanitize_orderby(
        &self,
        value: &Tree,
        path: &str,
        out: &mut Options,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let Some(text) = value.as_scalar().and_then(Scalar::as_str) else {
            errors.push(InputError::option(path, "expected a string"));
            return Ok(());
        };
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [field, sort] = tokens.as_slice() else {
            errors.push(InputError::option(path, "expected `field_name asc|desc`"));
            return Ok(());
        };
        let Some(sort) = Sort::parse(sort) else {
            errors.push(InputError::option(path, format!("invalid sort `{sort}`")));
            return Ok(());
        };
        match self.resolve_sortable(field)? {
            Some(internal) => out.orderby = Some(OrderBy::new(internal, sort)),
            None => errors.push(InputError::option(path, format!("cannot order by `{field}`"))),
        }
        Ok(())
    }

    /// Resolve a dotted wire path to a leaf or computed field reachable through objects and
    /// one-to-one relations. Returns the internal dotted path.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn resolve_sortable(&self, wire_path: &str) -> Result<Option<String>, ConfigError> {
        let mut object = self;
        let mut internal = Vec::new();
        let mut segments = wire_path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let Ok((name, field)) = object.lookup(segment) else {
                return Ok(None);
            };
            internal.push(name);
            let last = segments.peek().is_none();
            match field {
                FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) if last => {
                    return Ok(Some(internal.join(".")));
                }
                FieldConfiguration::Object(child) if !last => object = child,
                FieldConfiguration::Linked(link) if !last && link.cardinality() == Cardinality::OneToOne => {
                    object = link.config()?.fields();
                }
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    // --- unknown keys ---

    /// Walk `input` and report every key that is not a child of this object.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked child is reached before `init`.
    pub fn find_errors(
        &self,
        context: ErrorContext,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let Some(map) = input.as_object() else {
            return Ok(());
        };
        for (key, value) in map {
            if context == ErrorContext::FilteringField && matches!(key.as_str(), "and" | "or") {
                for item in value.as_array().unwrap_or_default() {
                    self.find_errors(context, item, path, errors)?;
                }
                continue;
            }
            let child_path = join_path(path, key);
            match self.lookup(key) {
                Ok((_, field)) => field.find_errors(context, value, &child_path, errors)?,
                Err(reason) => errors.push(InputError::new(context, child_path, reason)),
            }
        }
        Ok(())
    }
}

fn or_root<'a>(path: &'a str, root: &'a str) -> &'a str {
    if path.is_empty() { root } else { path }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_offset(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.floor() as u64)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::filter::{Comparison, Operator};
    use crate::predicate::TypePredicate;
    use crate::validator::FilterCapabilities;
    use serde_json::json;

    fn schema() -> ObjectField {
        ObjectField::new()
            .with("name", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
            .with(
                "status",
                FieldConfiguration::restricted(TypePredicate::String, FilterCapabilities::NONE, ["opened", "closed"]),
            )
            .with(
                "address",
                FieldConfiguration::object(
                    ObjectField::new()
                        .with("city", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
                        .with(
                            "countryCode",
                            FieldConfiguration::restricted(TypePredicate::String, FilterCapabilities::NONE, ["FR"]),
                        ),
                ),
            )
    }

    fn filters(input: serde_json::Value) -> (FiltersTree, Vec<InputError>) {
        let mut errors = Vec::new();
        let tree = Tree::from(input);
        let out = schema().sanitize_filters(&tree, "", &mut errors).unwrap();
        schema()
            .find_errors(ErrorContext::FilteringField, &tree, "", &mut errors)
            .unwrap();
        (out, errors)
    }

    #[test]
    fn select_true_on_object_selects_its_leaves() {
        let mut errors = Vec::new();
        let fields = schema()
            .sanitize_fields(&Tree::from(json!({"address": true})), "", &mut errors)
            .unwrap();
        let address = fields.nested("address").unwrap();
        assert!(address.is_selected("city"));
        assert!(address.is_selected("countryCode"));
        assert!(!fields.is_selected("name"));
        assert!(errors.is_empty());
    }

    #[test]
    fn unknown_selected_keys_are_reported_once() {
        let mut errors = Vec::new();
        let input = Tree::from(json!({"name": true, "nickname": true, "address": {"countryCode": true}}));
        let fields = schema().sanitize_fields(&input, "", &mut errors).unwrap();
        schema()
            .find_errors(ErrorContext::SelectedField, &input, "", &mut errors)
            .unwrap();
        assert!(fields.is_selected("name"));
        assert!(!fields.is_selected("address"));
        let names: Vec<_> = errors.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(names, vec!["address.countryCode", "nickname"]);
        assert_eq!(errors[0].reason, "field name is not in snake_case");
        assert_eq!(errors[1].reason, "unknown field");
    }

    #[test]
    fn nested_defaults_land_in_one_nested_entry() {
        let (out, errors) = filters(json!({"address": {"city": {"operator": "equals", "value": "Paris"}}}));
        assert!(errors.is_empty());
        let nested = out.find_nested("address").unwrap();
        assert_eq!(nested.and.len(), 1);
        assert_eq!(nested.or.len(), 1);
        assert_eq!(out.and.iter().filter(|e| matches!(e, FilterEntry::Nested { .. })).count(), 1);
        // root restriction on status
        assert_eq!(out.or.len(), 2);
    }

    #[test]
    fn and_or_arrays_and_groups() {
        let (out, errors) = filters(json!({
            "name": {"operator": "contains", "value": "a"},
            "or": [
                {"status": {"operator": "equals", "value": "opened"}},
                {"and": [{"name": {"operator": "equals", "value": "b"}}], "or": []}
            ],
            "and": [{"bogus": {"operator": "equals", "value": 1}}]
        }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field_name, "bogus");
        assert_eq!(out.or.len(), 2);
        assert!(matches!(out.or[1], FilterEntry::Group(_)));
        // `or` mixes fields, so the status restriction is added as an and-group
        assert!(out.and.iter().any(|e| matches!(e, FilterEntry::Group(g) if g.constrains("status"))));
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let (first, _) = filters(json!({
            "or": [
                {"status": {"operator": "equals", "value": "opened"}},
                {"name": {"operator": "equals", "value": "B"}}
            ]
        }));
        let (second, errors) = filters(first.to_wire());
        assert!(errors.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn options_limits_and_orderby() {
        let mut errors = Vec::new();
        let limits = QueryLimits::default();
        let options = schema()
            .sanitize_options(
                &Tree::from(json!({"limit": 9000, "offset": -1, "orderby": "address.city desc", "page": 2})),
                &limits,
                "",
                &mut errors,
            )
            .unwrap();
        assert_eq!(options.pagination.limit, 5000);
        assert_eq!(options.pagination.offset, 0);
        assert_eq!(options.orderby, Some(OrderBy::new("address.city", Sort::Desc)));
        let names: Vec<_> = errors.iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(names, vec!["offset", "page"]);
    }

    #[test]
    fn malformed_orderby_is_rejected() {
        for text in ["name", "name up", "address asc", "ghost asc", "name asc extra"] {
            let mut errors = Vec::new();
            let options = schema()
                .sanitize_options(&Tree::from(json!({"orderby": text})), &QueryLimits::default(), "", &mut errors)
                .unwrap();
            assert!(options.orderby.is_none(), "{text}");
            assert_eq!(errors.len(), 1, "{text}");
        }
    }

    #[test]
    fn comparisons_keep_operator() {
        let (out, _) = filters(json!({"name": {"operator": "contains", "value": "x"}}));
        assert!(matches!(
            &out.and[0],
            FilterEntry::Compare { comparison: Comparison { operator: Operator::Contains, .. }, .. }
        ));
    }
}
