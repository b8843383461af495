use fieldgate_request::{ConfigError, DomainRegistry, DomainRequestBuilder, QueryLimits, Tree};
use fieldgate_sql::{DomainResult, MappingError, TableRegistry};
use tracing::{debug, instrument};

use crate::config::FieldgateConfig;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Request-handling context, built once at start-up and shared by reference.
///
/// Holds the per-role schemas, the table mappings bound to their executor and the page
/// policy. Nothing about it is global: two contexts in one process never see each other.
///
/// ```ignore
/// let ctx = DomainContext::new(domains, tables, config.limits);
/// let result = ctx.query("ticket", "student", &Tree::from(body)).await?;
/// respond(result.to_wire());
/// ```
#[derive(Debug, Clone)]
pub struct DomainContext {
    domains: DomainRegistry,
    tables: TableRegistry,
    limits: QueryLimits,
}

impl DomainContext {
    #[must_use]
    pub fn new(domains: DomainRegistry, tables: TableRegistry, limits: QueryLimits) -> Self {
        Self {
            domains,
            tables,
            limits,
        }
    }

    #[must_use]
    pub fn from_config(domains: DomainRegistry, tables: TableRegistry, config: &FieldgateConfig) -> Self {
        Self::new(domains, tables, config.limits)
    }

    #[must_use]
    pub fn domains(&self) -> &DomainRegistry {
        &self.domains
    }

    #[must_use]
    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    #[must_use]
    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// # Errors
    /// `ContextError::Config` when `(domain, role)` has no schema or its links are unresolved.
    pub fn request_builder(&self, domain: &str, role: &str) -> Result<DomainRequestBuilder, ContextError> {
        Ok(self.domains.request_builder(domain, role, self.limits)?)
    }

    /// Sanitize `input` for `role`, fetch it and attach the rejected input.
    ///
    /// Rejected input never fails the call; it comes back in `DomainResult::errors`
    /// next to the rows the sanitized request produced.
    ///
    /// # Errors
    /// Schema or mapping wiring mistakes only.
    #[instrument(skip_all, fields(domain = %domain, role = %role))]
    pub async fn query(&self, domain: &str, role: &str, input: &Tree) -> Result<DomainResult, ContextError> {
        let built = self.request_builder(domain, role)?.build(input)?;
        if !built.errors.is_empty() {
            debug!(rejected = built.errors.len(), "input partially rejected");
        }
        let result = self.tables.fetch(&built.request).await?;
        Ok(result.with_errors(built.errors))
    }
}
