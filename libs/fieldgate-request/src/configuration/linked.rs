use std::fmt;
use std::sync::{Arc, OnceLock};

use super::{OptionScope, with_nested};
use crate::domain::DomainConfig;
use crate::error::{ConfigError, ErrorContext, InputError};
use crate::fields::{Requested, RequestableFields};
use crate::filter::{Bucket, FilterEntry, FiltersTree, RelationRestriction, RelationRestrictions};
use crate::options::Options;
use crate::tree::{Scalar, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    OneToMany,
}

/// Field backed by another whole domain.
///
/// Built unresolved; the registry hands it the target configuration in a second pass
/// (`init`), which lets domains reference each other.
pub struct LinkedField {
    domain: String,
    cardinality: Cardinality,
    target: OnceLock<Arc<DomainConfig>>,
}

impl fmt::Debug for LinkedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the target may link back to us
        f.debug_struct("LinkedField")
            .field("domain", &self.domain)
            .field("cardinality", &self.cardinality)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl LinkedField {
    pub fn new(domain: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            domain: domain.into(),
            cardinality,
            target: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Resolve the link.
    ///
    /// # Errors
    /// `ConfigError::AlreadyInitialized` on a second call.
    pub fn init(&self, config: Arc<DomainConfig>) -> Result<(), ConfigError> {
        self.target
            .set(config)
            .map_err(|_| ConfigError::AlreadyInitialized {
                domain: self.domain.clone(),
            })
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }

    /// Target configuration.
    ///
    /// # Errors
    /// `ConfigError::Uninitialized` before `init`.
    pub fn config(&self) -> Result<&Arc<DomainConfig>, ConfigError> {
        self.target.get().ok_or_else(|| ConfigError::Uninitialized {
            domain: self.domain.clone(),
        })
    }

    pub(super) fn sanitize_field(
        &self,
        input: Option<&Tree>,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<Requested, ConfigError> {
        match input {
            None | Some(Tree::Leaf(Scalar::Null | Scalar::Bool(false))) => Ok(Requested::Flag(false)),
            Some(Tree::Leaf(Scalar::Bool(true))) => Ok(Requested::Nested(self.config()?.fields().select_all())),
            Some(tree @ Tree::Object(_)) => Ok(Requested::Nested(
                self.config()?.fields().sanitize_fields(tree, path, errors)?,
            )),
            Some(_) => {
                errors.push(InputError::selected(path, "expected a boolean or an object"));
                Ok(Requested::Flag(false))
            }
        }
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
        let fields = self.config()?.fields();
        let mut nested = fields.collect_filters(input, path, errors)?;
        if nested.is_empty() {
            return Ok(());
        }
        fields.apply_child_defaults(&mut nested);
        out.push(bucket, FilterEntry::nested(name, nested));
        Ok(())
    }

    /// A selected target brings its restrictions along: on the joined row for a
    /// one-to-one, on the child round for a one-to-many.
    pub(super) fn apply_selection_defaults(
        &self,
        name: &str,
        relation: &str,
        selection: &RequestableFields,
        out: &mut FiltersTree,
        relations: &mut RelationRestrictions,
    ) -> Result<(), ConfigError> {
        if !selection.any_selected() {
            return Ok(());
        }
        let fields = self.config()?.fields();
        match self.cardinality {
            Cardinality::OneToOne => with_nested(out, name, |nested| {
                fields.apply_child_defaults(nested);
                fields.apply_selection_defaults(selection, relation, nested, relations)
            }),
            Cardinality::OneToMany => {
                let mut restriction = RelationRestriction::default();
                fields.apply_child_defaults(&mut restriction.filters);
                fields.apply_selection_defaults(selection, "", &mut restriction.filters, &mut restriction.relations)?;
                relations.insert(relation, restriction);
                Ok(())
            }
        }
    }

    pub(super) fn sanitize_option(
        &self,
        input: &Tree,
        scope: OptionScope<'_>,
        out: &mut Options,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        let fields = self.config()?.fields();
        match self.cardinality {
            Cardinality::OneToOne => fields.sanitize_relation_options(input, scope, out, errors),
            Cardinality::OneToMany => {
                let nested = fields.sanitize_options(input, scope.limits, scope.wire, errors)?;
                out.relations.insert(scope.relation.to_owned(), nested);
                Ok(())
            }
        }
    }

    pub(super) fn find_errors(
        &self,
        context: ErrorContext,
        input: &Tree,
        path: &str,
        errors: &mut Vec<InputError>,
    ) -> Result<(), ConfigError> {
        self.config()?.fields().find_errors(context, input, path, errors)
    }
}
