//! Field configuration tree.
//!
//! One closed sum type per schema node. Every node knows how to sanitize a selection, a
//! filter and an option, how to report unknown keys, and how to inject the default
//! restriction of role-restricted values.

mod computed;
mod leaf;
mod linked;
mod object;

pub use computed::ComputedField;
pub use leaf::LeafField;
pub use linked::{Cardinality, LinkedField};
pub use object::ObjectField;

use crate::error::{ConfigError, ErrorContext, InputError};
use crate::fields::Requested;
use crate::filter::{Bucket, Comparison, FilterEntry, FiltersTree, Operator, RelationRestrictions};
use crate::options::{Options, QueryLimits};
use crate::predicate::{DataPredicate, TypePredicate};
use crate::tree::{Scalar, Tree};
use crate::validator::{FilterCapabilities, Validator};

#[derive(Debug)]
pub enum FieldConfiguration {
    Leaf(LeafField),
    Computed(ComputedField),
    Object(ObjectField),
    Linked(LinkedField),
}

/// Where an option is being read: the relation path (internal, dotted) and its wire path.
#[derive(Debug, Clone, Copy)]
pub struct OptionScope<'a> {
    pub limits: &'a QueryLimits,
    pub relation: &'a str,
    pub wire: &'a str,
}

impl FieldConfiguration {
    #[must_use]
    pub fn leaf(predicate: TypePredicate, capabilities: FilterCapabilities) -> Self {
        FieldConfiguration::Leaf(LeafField::new(predicate, capabilities))
    }

    /// Leaf field whose values are limited to `values` for the role owning this schema.
    pub fn restricted<I, V>(predicate: TypePredicate, capabilities: FilterCapabilities, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        FieldConfiguration::Leaf(LeafField::new(predicate, capabilities).restricted_to(values))
    }

    #[must_use]
    pub fn computed(
        predicate: TypePredicate,
        capabilities: FilterCapabilities,
        data_predicate: DataPredicate,
    ) -> Self {
        FieldConfiguration::Computed(ComputedField::new(predicate, capabilities, data_predicate))
    }

    #[must_use]
    pub fn object(fields: ObjectField) -> Self {
        FieldConfiguration::Object(fields)
    }

    pub fn one_to_one(domain: impl Into<String>) -> Self {
        FieldConfiguration::Linked(LinkedField::new(domain, Cardinality::OneToOne))
    }

    pub fn one_to_many(domain: impl Into<String>) -> Self {
        FieldConfiguration::Linked(LinkedField::new(domain, Cardinality::OneToMany))
    }

    /// Sanitize the selection flag (or nested selection) of this field.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked field is reached before `init`.
    pub fn sanitize_field(
        &self,
        input: Option<&Tree>,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<Requested, ConfigError> {
        match self {
            FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) => {
                Ok(leaf::sanitize_flag(input, path, errors))
            }
            FieldConfiguration::Object(object) => object.sanitize_field(input, path, errors),
            FieldConfiguration::Linked(linked) => linked.sanitize_field(input, path, errors),
        }
    }

    /// Sanitize the filter input of this field into `out`, in `bucket`.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked field is reached before `init`.
    pub fn sanitize_filter(
        &self,
        name: &str,
        input: &Tree,
        out: &mut FiltersTree,
        bucket: Bucket,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        match self {
            FieldConfiguration::Leaf(leaf) => {
                leaf.sanitize_filter(name, input, out, bucket, path, errors);
                Ok(())
            }
            FieldConfiguration::Computed(computed) => {
                computed.sanitize_filter(name, input, out, bucket, path, errors);
                Ok(())
            }
            FieldConfiguration::Object(object) => {
                object.sanitize_filter(name, input, out, bucket, path, errors)
            }
            FieldConfiguration::Linked(linked) => {
                linked.sanitize_filter(name, input, out, bucket, path, errors)
            }
        }
    }

    /// Sanitize relation options addressed to this field.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked field is reached before `init`.
    pub fn sanitize_option(
        &self,
        input: &Tree,
        scope: OptionScope<'_>,
        out: &mut Options,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        match self {
            FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) => {
                errors.push(InputError::option(scope.wire, "not a relation"));
                Ok(())
            }
            FieldConfiguration::Object(object) => object.sanitize_relation_options(input, scope, out, errors),
            FieldConfiguration::Linked(linked) => linked.sanitize_option(input, scope, out, errors),
        }
    }

    /// Report every input key below this field that matches no schema field.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked field is reached before `init`.
    pub fn find_errors(
        &self,
        context: ErrorContext,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        match self {
            FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) => Ok(()),
            FieldConfiguration::Object(object) => object.find_errors(context, input, path, errors),
            FieldConfiguration::Linked(linked) => linked.find_errors(context, input, path, errors),
        }
    }

    /// Inject the default restriction of this field when `out` does not constrain it yet.
    pub fn apply_defaults(&self, name: &str, out: &mut FiltersTree) {
        match self {
            FieldConfiguration::Leaf(leaf) => leaf.apply_defaults(name, out),
            FieldConfiguration::Object(object) => object.apply_defaults(name, out),
            FieldConfiguration::Computed(_) | FieldConfiguration::Linked(_) => {}
        }
    }

    /// Inject the restrictions of the linked domains reached by selecting this field.
    ///
    /// A one-to-one target constrains the row through a nested entry of `out`; a
    /// one-to-many target lands in `relations` under `relation`, its dotted path.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` when a linked field is reached before `init`.
    pub fn apply_selection_defaults(
        &self,
        name: &str,
        relation: &str,
        requested: &Requested,
        out: &mut FiltersTree,
        relations: &mut RelationRestrictions,
    ) -> Result<(), ConfigError> {
        let Requested::Nested(selection) = requested else {
            return Ok(());
        };
        match self {
            FieldConfiguration::Object(object) => with_nested(out, name, |nested| {
                object.apply_selection_defaults(selection, relation, nested, relations)
            }),
            FieldConfiguration::Linked(linked) => {
                linked.apply_selection_defaults(name, relation, selection, out, relations)
            }
            FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) => Ok(()),
        }
    }

    /// Whether selecting the parent with `true` selects this field too.
    #[must_use]
    pub fn is_selected_by_default(&self) -> bool {
        matches!(self, FieldConfiguration::Leaf(_) | FieldConfiguration::Object(_))
    }
}

/// Run `apply` on the `and` nested tree of `name`, creating it only if `apply` adds anything.
fn with_nested<F>(out: &mut FiltersTree, name: &str, apply: F) -> Result<(), ConfigError>
where
    F: FnOnce(&mut FiltersTree) -> Result<(), ConfigError>,
{
    if let Some(existing) = out.nested_and_mut(name) {
        return apply(existing);
    }
    let mut nested = FiltersTree::new();
    apply(&mut nested)?;
    if !nested.is_empty() {
        out.and.push(FilterEntry::nested(name, nested));
    }
    Ok(())
}

/// A filter value is one comparison object or an array of them.
fn comparison_inputs(input: &Tree) -> Vec<&Tree> {
    match input {
        Tree::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Parse `{operator, value[, data]}` against `validator`.
fn parse_comparison(validator: &Validator, raw: &Tree, accepts_data: bool) -> Result<Comparison, String> {
    let Some(map) = raw.as_object() else {
        return Err("expected a comparison object with `operator` and `value`".into());
    };
    if let Some(key) = map
        .keys()
        .find(|k| !matches!(k.as_str(), "operator" | "value" | "data"))
    {
        return Err(format!("unknown comparison key `{key}`"));
    }
    let operator = match map.get("operator") {
        Some(Tree::Leaf(Scalar::String(name))) => {
            Operator::parse(name).ok_or_else(|| format!("unknown operator `{name}`"))?
        }
        Some(_) => return Err("`operator` must be a string".into()),
        None => return Err("missing `operator`".into()),
    };
    let Some(value) = map.get("value") else {
        return Err("missing `value`".into());
    };
    let comparison = Comparison::new(operator, validator.validate(operator, value)?);
    match map.get("data") {
        Some(data) if accepts_data => Ok(comparison.with_data(data.clone())),
        Some(_) => Err("`data` is only accepted on computed fields".into()),
        None => Ok(comparison),
    }
}
