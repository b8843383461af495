//! Domain schemas and the validated request handed to the query engine.

use serde_json::{Map, Value};

use crate::configuration::{FieldConfiguration, LinkedField, ObjectField};
use crate::error::ConfigError;
use crate::fields::RequestableFields;
use crate::filter::{FiltersTree, RelationRestrictions};
use crate::options::Options;

/// Per-role schema of one domain. Built once at start-up, read-only afterwards.
#[derive(Debug)]
pub struct DomainConfig {
    name: String,
    natural_key: Vec<String>,
    fields: ObjectField,
}

impl DomainConfig {
    /// # Errors
    /// `ConfigError::EmptyNaturalKey` when `natural_key` is empty.
    pub fn new<K, S>(name: impl Into<String>, natural_key: K, fields: ObjectField) -> Result<Self, ConfigError>
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let natural_key: Vec<String> = natural_key.into_iter().map(Into::into).collect();
        if natural_key.is_empty() {
            return Err(ConfigError::EmptyNaturalKey { domain: name });
        }
        Ok(Self {
            name,
            natural_key,
            fields,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn natural_key(&self) -> &[String] {
        &self.natural_key
    }

    #[must_use]
    pub fn fields(&self) -> &ObjectField {
        &self.fields
    }

    /// Linked fields declared by this schema (through objects, not through other domains).
    #[must_use]
    pub fn links(&self) -> Vec<&LinkedField> {
        let mut out = Vec::new();
        collect_links(&self.fields, &mut out);
        out
    }
}

fn collect_links<'a>(object: &'a ObjectField, out: &mut Vec<&'a LinkedField>) {
    for (_, field) in object.iter() {
        match field {
            FieldConfiguration::Linked(link) => out.push(link),
            FieldConfiguration::Object(child) => collect_links(child, out),
            FieldConfiguration::Leaf(_) | FieldConfiguration::Computed(_) => {}
        }
    }
}

/// Fully validated, immutable unit of work for the query engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRequest {
    name: String,
    natural_key: Vec<String>,
    fields: RequestableFields,
    filters: FiltersTree,
    options: Options,
    restrictions: RelationRestrictions,
}

impl DomainRequest {
    /// # Errors
    /// `ConfigError::EmptyNaturalKey` when `natural_key` is empty.
    pub fn new(
        name: impl Into<String>,
        natural_key: Vec<String>,
        fields: RequestableFields,
        filters: FiltersTree,
        options: Options,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if natural_key.is_empty() {
            return Err(ConfigError::EmptyNaturalKey { domain: name });
        }
        Ok(Self {
            name,
            natural_key,
            fields,
            filters,
            options,
            restrictions: RelationRestrictions::new(),
        })
    }

    /// Attach the restrictions of the selected one-to-many relations.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: RelationRestrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn natural_key(&self) -> &[String] {
        &self.natural_key
    }

    #[must_use]
    pub fn fields(&self) -> &RequestableFields {
        &self.fields
    }

    #[must_use]
    pub fn filters(&self) -> &FiltersTree {
        &self.filters
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Restrictions of the child rounds; derived from the selection, never sent on the wire.
    #[must_use]
    pub fn restrictions(&self) -> &RelationRestrictions {
        &self.restrictions
    }

    /// Wire form `{fields, filters, options}`; building it again yields the same request.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("fields".into(), self.fields.to_wire());
        map.insert("filters".into(), self.filters.to_wire());
        map.insert("options".into(), self.options.to_wire());
        Value::Object(map)
    }
}
