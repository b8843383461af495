//! Per-role domain registry.
//!
//! Schemas are registered unresolved, then `build` resolves every linked field against
//! the configuration of the same role in one pass.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::builder::DomainRequestBuilder;
use crate::domain::DomainConfig;
use crate::error::ConfigError;
use crate::options::QueryLimits;

type Key = (String, String);

#[derive(Debug, Default)]
#[must_use]
pub struct DomainRegistryBuilder {
    configs: HashMap<Key, Arc<DomainConfig>>,
    order: Vec<Key>,
}

impl DomainRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema `config` exposes to `role`.
    ///
    /// # Errors
    /// `ConfigError::DuplicateDomain` when `(domain, role)` is already registered.
    pub fn register(mut self, role: impl Into<String>, config: DomainConfig) -> Result<Self, ConfigError> {
        let key = (config.name().to_owned(), role.into());
        if self.configs.contains_key(&key) {
            return Err(ConfigError::DuplicateDomain {
                domain: key.0,
                role: key.1,
            });
        }
        self.order.push(key.clone());
        self.configs.insert(key, Arc::new(config));
        Ok(self)
    }

    /// Resolve every link and freeze the registry.
    ///
    /// # Errors
    /// `ConfigError::UnresolvedLink` when a link names a domain the role does not have.
    pub fn build(self) -> Result<DomainRegistry, ConfigError> {
        for key in &self.order {
            let (domain, role) = key;
            let Some(config) = self.configs.get(key) else {
                continue;
            };
            for link in config.links() {
                let target_key = (link.domain().to_owned(), role.clone());
                let target = self
                    .configs
                    .get(&target_key)
                    .ok_or_else(|| ConfigError::UnresolvedLink {
                        domain: link.domain().to_owned(),
                        role: role.clone(),
                    })?;
                link.init(Arc::clone(target))?;
                debug!(%domain, %role, target = link.domain(), "link resolved");
            }
        }
        Ok(DomainRegistry {
            configs: self.configs,
        })
    }
}

/// Resolved `(domain, role)` → schema map.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    configs: HashMap<Key, Arc<DomainConfig>>,
}

impl DomainRegistry {
    pub fn builder() -> DomainRegistryBuilder {
        DomainRegistryBuilder::new()
    }

    /// # Errors
    /// `ConfigError::UnknownDomain` when nothing is registered for `(domain, role)`.
    pub fn get(&self, domain: &str, role: &str) -> Result<&Arc<DomainConfig>, ConfigError> {
        self.configs
            .get(&(domain.to_owned(), role.to_owned()))
            .ok_or_else(|| ConfigError::UnknownDomain {
                domain: domain.to_owned(),
                role: role.to_owned(),
            })
    }

    /// # Errors
    /// `ConfigError::UnknownDomain` when nothing is registered for `(domain, role)`.
    pub fn request_builder(
        &self,
        domain: &str,
        role: &str,
        limits: QueryLimits,
    ) -> Result<DomainRequestBuilder, ConfigError> {
        DomainRequestBuilder::new(Arc::clone(self.get(domain, role)?), limits)
    }

    /// Roles that have a schema for `domain`.
    #[must_use]
    pub fn roles(&self, domain: &str) -> Vec<&str> {
        let mut roles: Vec<&str> = self
            .configs
            .keys()
            .filter(|(d, _)| d == domain)
            .map(|(_, r)| r.as_str())
            .collect();
        roles.sort_unstable();
        roles
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::configuration::{FieldConfiguration, ObjectField};
    use crate::predicate::TypePredicate;
    use crate::validator::FilterCapabilities;

    fn project() -> DomainConfig {
        DomainConfig::new(
            "project",
            ["id"],
            ObjectField::new()
                .with("name", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
                .with("owner", FieldConfiguration::one_to_one("user")),
        )
        .unwrap()
    }

    fn user() -> DomainConfig {
        DomainConfig::new(
            "user",
            ["id"],
            ObjectField::new()
                .with("login", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
                .with("projects", FieldConfiguration::one_to_many("project")),
        )
        .unwrap()
    }

    #[test]
    fn resolves_mutual_links_per_role() {
        let registry = DomainRegistry::builder()
            .register("admin", project())
            .unwrap()
            .register("admin", user())
            .unwrap()
            .build()
            .unwrap();
        let config = registry.get("project", "admin").unwrap();
        assert!(config.links().iter().all(|l| l.is_initialized()));
        assert!(registry.request_builder("user", "admin", QueryLimits::default()).is_ok());
        assert_eq!(registry.roles("project"), vec!["admin"]);
    }

    #[test]
    fn missing_target_for_role_fails() {
        let err = DomainRegistry::builder()
            .register("admin", project())
            .unwrap()
            .register("guest", user())
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedLink { ref domain, ref role } if domain == "user" && role == "admin"));
    }

    #[test]
    fn duplicates_and_unknown_domains() {
        let err = DomainRegistry::builder()
            .register("admin", project())
            .unwrap()
            .register("admin", project())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDomain { .. }));

        let registry = DomainRegistry::default();
        assert!(matches!(
            registry.get("project", "admin"),
            Err(ConfigError::UnknownDomain { .. })
        ));
    }

    #[test]
    fn unresolved_builder_is_rejected() {
        let err = DomainRequestBuilder::new(Arc::new(project()), QueryLimits::default()).unwrap_err();
        assert_eq!(err, ConfigError::Uninitialized { domain: "user".into() });
    }
}
