use fieldgate_request::ConfigError;
use thiserror::Error;

/// Mapping mistakes found while planning. These are deployment errors, never caller input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("field `{field}` of table `{table}` has no mapping")]
    UnmappedField { table: String, field: String },

    #[error("field `{field}` of table `{table}` cannot be compared in SQL")]
    NotComparable { table: String, field: String },

    #[error("field `{field}` of table `{table}` does not match the shape of its mapping")]
    ShapeMismatch { table: String, field: String },

    #[error("natural key `{field}` of table `{table}` must map to a same-table column")]
    InvalidNaturalKey { table: String, field: String },

    #[error("one-to-many relation to `{domain}` used before resolution")]
    UnresolvedRelation { domain: String },

    #[error("no table mapping registered for domain `{domain}`")]
    UnknownTable { domain: String },

    #[error("table mapping for domain `{domain}` registered twice")]
    DuplicateTable { domain: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
