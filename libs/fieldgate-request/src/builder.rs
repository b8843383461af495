//! Request builder
//!
//! Turns an untrusted `{fields, filters, options}` tree into a [`DomainRequest`] plus the
//! list of [`InputError`]s found on the way.
//!
//! # Design
//!
//! - Each part is optional; a missing part is empty, never an error.
//! - Sanitizing never stops at the first problem: every error is collected and a
//!   best-effort request is always returned.
//! - Errors are ordered fields, then filters, then options.
//! - Selecting a linked field applies the restricted values of its target: a one-to-one
//!   constrains the joined row, a one-to-many narrows its child round.
//!
//! # Example
//!
//! ```rust,ignore
//! let builder = DomainRequestBuilder::new(config, QueryLimits::default())?;
//! let built = builder.build(&Tree::from(serde_json::json!({
//!     "fields": {"name": true, "status": true},
//!     "filters": {"name": {"operator": "contains", "value": "a"}},
//!     "options": {"limit": 20, "orderby": "name asc"}
//! })))?;
//! assert!(built.errors.is_empty());
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::{DomainConfig, DomainRequest};
use crate::error::{ConfigError, ErrorContext, InputError};
use crate::filter::RelationRestrictions;
use crate::options::QueryLimits;
use crate::tree::{Scalar, Tree};

/// Outcome of [`DomainRequestBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    pub request: DomainRequest,
    pub errors: Vec<InputError>,
}

/// Sanitizes requests for one domain and role.
#[derive(Debug, Clone)]
pub struct DomainRequestBuilder {
    config: Arc<DomainConfig>,
    limits: QueryLimits,
}

impl DomainRequestBuilder {
    /// # Errors
    /// `ConfigError::Uninitialized` when a link reachable from `config` was never resolved.
    pub fn new(config: Arc<DomainConfig>, limits: QueryLimits) -> Result<Self, ConfigError> {
        ensure_initialized(&config, &mut HashSet::new())?;
        Ok(Self { config, limits })
    }

    #[must_use]
    pub fn config(&self) -> &Arc<DomainConfig> {
        &self.config
    }

    #[must_use]
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Sanitize `input` into a request.
    ///
    /// # Errors
    /// Only schema wiring mistakes are raised; bad input lands in `BuiltRequest::errors`.
    #[instrument(skip_all, fields(domain = %self.config.name()))]
    pub fn build(&self, input: &Tree) -> Result<BuiltRequest, ConfigError> {
        let empty = Tree::empty();
        let root = self.config.fields();
        let mut errors = Vec::new();

        let fields_input = input.get("fields").unwrap_or(&empty);
        let fields = match fields_input {
            Tree::Leaf(Scalar::Bool(true)) => root.select_all(),
            Tree::Object(_) => {
                let fields = root.sanitize_fields(fields_input, "", &mut errors)?;
                root.find_errors(ErrorContext::SelectedField, fields_input, "", &mut errors)?;
                fields
            }
            other => {
                if !other.is_empty() {
                    errors.push(InputError::selected("fields", "expected an object"));
                }
                root.sanitize_fields(&empty, "", &mut errors)?
            }
        };

        let filters_input = input.get("filters").unwrap_or(&empty);
        let mut filters = root.sanitize_filters(filters_input, "", &mut errors)?;
        root.find_errors(ErrorContext::FilteringField, filters_input, "", &mut errors)?;
        let mut restrictions = RelationRestrictions::new();
        root.apply_selection_defaults(&fields, "", &mut filters, &mut restrictions)?;

        let options_input = input.get("options").unwrap_or(&empty);
        let options = root.sanitize_options(options_input, &self.limits, "", &mut errors)?;

        let request = DomainRequest::new(
            self.config.name(),
            self.config.natural_key().to_vec(),
            fields,
            filters,
            options,
        )?
        .with_restrictions(restrictions);
        debug!(
            errors = errors.len(),
            selected = request.fields().any_selected(),
            "request sanitized"
        );
        Ok(BuiltRequest { request, errors })
    }
}

fn ensure_initialized(config: &DomainConfig, visited: &mut HashSet<*const DomainConfig>) -> Result<(), ConfigError> {
    if !visited.insert(std::ptr::from_ref(config)) {
        return Ok(());
    }
    for link in config.links() {
        ensure_initialized(link.config()?, visited)?;
    }
    Ok(())
}
