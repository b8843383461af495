use super::{comparison_inputs, parse_comparison};
use crate::error::InputError;
use crate::fields::Requested;
use crate::filter::{Bucket, Comparison, ComparisonValue, FilterEntry, FiltersTree, Operator};
use crate::predicate::TypePredicate;
use crate::tree::{Scalar, Tree};
use crate::validator::{FilterCapabilities, Validator};

/// Plain column-backed value.
#[derive(Debug, Clone)]
pub struct LeafField {
    validator: Validator,
    authorized_values: Option<Vec<Scalar>>,
}

impl LeafField {
    #[must_use]
    pub fn new(predicate: TypePredicate, capabilities: FilterCapabilities) -> Self {
        Self {
            validator: Validator::new(predicate, capabilities),
            authorized_values: None,
        }
    }

    /// Limit the values this role may see. An empty set denies every row.
    #[must_use]
    pub fn restricted_to<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        self.authorized_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub fn authorized_values(&self) -> Option<&[Scalar]> {
        self.authorized_values.as_deref()
    }

    pub(super) fn sanitize_filter(
        &self,
        name: &str,
        input: &Tree,
        out: &mut FiltersTree,
        bucket: Bucket,
        path: &str,
        errors: &mut Vec<InputError>,
    ) {
        for raw in comparison_inputs(input) {
            match self.sanitize_comparison(raw) {
                Ok(comparison) => out.push(bucket, FilterEntry::compare(name, comparison)),
                Err(reason) => errors.push(InputError::filtering(path, reason)),
            }
        }
    }

    fn sanitize_comparison(&self, raw: &Tree) -> Result<Comparison, String> {
        let comparison = parse_comparison(&self.validator, raw, false)?;
        let Some(authorized) = &self.authorized_values else {
            return Ok(comparison);
        };
        if comparison.operator != Operator::Equals {
            return Err("restricted field only accepts `equals`".into());
        }
        if let Some(denied) = comparison
            .value
            .scalars()
            .iter()
            .find(|v| !authorized.contains(v))
        {
            return Err(format!("value `{denied}` is not authorized"));
        }
        Ok(comparison)
    }

    pub(super) fn apply_defaults(&self, name: &str, out: &mut FiltersTree) {
        let Some(authorized) = &self.authorized_values else {
            return;
        };
        if out.constrains(name) {
            return;
        }
        if authorized.is_empty() {
            // IN () matches nothing
            out.and.push(FilterEntry::compare(
                name,
                Comparison::new(Operator::Equals, ComparisonValue::List(Vec::new())),
            ));
            return;
        }
        let defaults: Vec<FilterEntry> = authorized
            .iter()
            .map(|value| FilterEntry::compare(name, Comparison::equals(value.clone())))
            .collect();
        if out.or.is_empty() {
            out.or = defaults;
        } else {
            out.and.push(FilterEntry::Group(FiltersTree {
                and: Vec::new(),
                or: defaults,
            }));
        }
    }
}

/// Selection flag of a leaf or computed field.
pub(super) fn sanitize_flag(input: Option<&Tree>, path: &str, errors: &mut Vec<InputError>) -> Requested {
    match input {
        None | Some(Tree::Leaf(Scalar::Null)) => Requested::Flag(false),
        Some(Tree::Leaf(Scalar::Bool(selected))) => Requested::Flag(*selected),
        Some(_) => {
            errors.push(InputError::selected(path, "expected a boolean"));
            Requested::Flag(false)
        }
    }
}
