use super::{comparison_inputs, parse_comparison};
use crate::error::InputError;
use crate::filter::{Bucket, Comparison, FilterEntry, FiltersTree};
use crate::predicate::{DataPredicate, TypePredicate};
use crate::tree::Tree;
use crate::validator::{FilterCapabilities, Validator};

/// Value computed by the database from a caller-supplied payload (a distance from
/// reference coordinates, a score against a query...).
#[derive(Debug, Clone)]
pub struct ComputedField {
    validator: Validator,
    data_predicate: DataPredicate,
}

impl ComputedField {
    #[must_use]
    pub fn new(predicate: TypePredicate, capabilities: FilterCapabilities, data_predicate: DataPredicate) -> Self {
        Self {
            validator: Validator::new(predicate, capabilities),
            data_predicate,
        }
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
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
        let comparison = parse_comparison(&self.validator, raw, true)?;
        match &comparison.data {
            None => Err("missing `data`".into()),
            Some(data) if (self.data_predicate)(data) => Ok(comparison),
            Some(_) => Err("invalid `data`".into()),
        }
    }
}
