//! Domain → table mapping registry.
//!
//! Mappings are registered unresolved; `build` hands every one-to-many relation the
//! mapping of the domain it names, which lets tables reference each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use fieldgate_request::DomainRequest;
use tracing::debug;

use crate::error::MappingError;
use crate::executor::SqlExecutor;
use crate::mapping::TableMapping;
use crate::report::DomainResult;
use crate::table::Table;

#[derive(Debug, Default)]
#[must_use]
pub struct TableRegistryBuilder {
    mappings: BTreeMap<String, Arc<TableMapping>>,
}

impl TableRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `MappingError::DuplicateTable` when `domain` already has a mapping.
    pub fn register(mut self, domain: impl Into<String>, mapping: TableMapping) -> Result<Self, MappingError> {
        let domain = domain.into();
        if self.mappings.contains_key(&domain) {
            return Err(MappingError::DuplicateTable { domain });
        }
        self.mappings.insert(domain, Arc::new(mapping));
        Ok(self)
    }

    /// Resolve every relation and bind the mappings to `executor`.
    ///
    /// # Errors
    /// `MappingError::UnknownTable` when a relation names an unregistered domain.
    pub fn build(self, executor: Arc<dyn SqlExecutor>) -> Result<TableRegistry, MappingError> {
        for (domain, mapping) in &self.mappings {
            for relation in mapping.relations() {
                if relation.is_resolved() {
                    continue;
                }
                let other = self
                    .mappings
                    .get(&relation.other_domain)
                    .ok_or_else(|| MappingError::UnknownTable {
                        domain: relation.other_domain.clone(),
                    })?;
                relation.resolve(Arc::clone(other));
                debug!(%domain, other = %relation.other_domain, "relation resolved");
            }
        }
        Ok(TableRegistry {
            mappings: self.mappings,
            executor,
        })
    }
}

/// Resolved mappings sharing one executor.
#[derive(Clone)]
pub struct TableRegistry {
    mappings: BTreeMap<String, Arc<TableMapping>>,
    executor: Arc<dyn SqlExecutor>,
}

impl std::fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistry")
            .field("domains", &self.mappings.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TableRegistry {
    pub fn builder() -> TableRegistryBuilder {
        TableRegistryBuilder::new()
    }

    /// # Errors
    /// `MappingError::UnknownTable` when `domain` has no mapping.
    pub fn table(&self, domain: &str) -> Result<Table, MappingError> {
        let mapping = self
            .mappings
            .get(domain)
            .ok_or_else(|| MappingError::UnknownTable {
                domain: domain.to_owned(),
            })?;
        Ok(Table::new(Arc::clone(mapping), Arc::clone(&self.executor)))
    }

    /// Fetch `request` from the table of its domain.
    ///
    /// # Errors
    /// See [`Table::fetch`]; also `MappingError::UnknownTable`.
    pub async fn fetch(&self, request: &DomainRequest) -> Result<DomainResult, MappingError> {
        self.table(request.name())?.fetch(request).await
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.mappings.keys().map(String::as_str)
    }
}
