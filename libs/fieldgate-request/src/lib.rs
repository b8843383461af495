#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Request side of fieldgate.
//!
//! A per-role schema ([`DomainConfig`], a tree of [`FieldConfiguration`] nodes) turns an
//! untrusted `{fields, filters, options}` [`Tree`] into a validated [`DomainRequest`] and
//! a list of [`InputError`]s. The SQL side consumes the request.

pub mod builder;
pub mod configuration;
pub mod domain;
pub mod error;
pub mod fields;
pub mod filter;
pub mod naming;
pub mod options;
pub mod predicate;
pub mod registry;
pub mod tree;
pub mod validator;

pub use builder::{BuiltRequest, DomainRequestBuilder};
pub use configuration::{
    Cardinality, ComputedField, FieldConfiguration, LeafField, LinkedField, ObjectField, OptionScope,
};
pub use domain::{DomainConfig, DomainRequest};
pub use error::{ConfigError, ErrorContext, InputError};
pub use fields::{Requested, RequestableFields};
pub use filter::{
    Bucket, Comparison, ComparisonValue, FilterEntry, FiltersTree, Operator, RelationRestriction, RelationRestrictions,
};
pub use options::{DEFAULT_LIMIT, MAX_LIMIT, OrderBy, Options, Pagination, QueryLimits, Sort};
pub use predicate::{DataPredicate, TypePredicate};
pub use registry::{DomainRegistry, DomainRegistryBuilder};
pub use tree::{BoolTree, Scalar, Tree};
pub use validator::{FilterCapabilities, Validator};
