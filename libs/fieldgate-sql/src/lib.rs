#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Fieldgate SQL engine.
//!
//! Maps sanitized [`fieldgate_request::DomainRequest`]s onto relational tables:
//! plans `SELECT` statements with their `JOIN`s, `WHERE`, `ORDER BY` and page,
//! runs them through a [`SqlExecutor`] and rebuilds nested domain objects from the
//! flat rows.
//!
//! # Features
//! - `sqlite` (default): [`sqlite::SqliteExecutor`] over a `sqlx` pool
//!
//! # Example
//! ```rust,ignore
//! let tables = TableRegistry::builder()
//!     .register("ticket", ticket_mapping())?
//!     .register("comment", comment_mapping())?
//!     .build(Arc::new(SqliteExecutor::connect("sqlite::memory:", &PoolConfig::default()).await?))?;
//! let result = tables.fetch(&built.request).await?.with_errors(built.errors);
//! println!("{}", result.to_wire());
//! ```

pub mod convert;
pub mod error;
pub mod executor;
pub mod literal;
pub mod mapping;
pub mod plan;
pub mod reconstruct;
pub mod registry;
pub mod report;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod table;

pub use error::MappingError;
pub use executor::{Row, SqlExecutor};
pub use mapping::{
    Column, ComputedColumn, ComputedExpression, FieldMapping, FieldMappings, ForeignKey, JoinTable, OneToMany,
    OneToOne, TableDef, TableMapping,
};
pub use plan::{Plan, RelationPlan, plan};
pub use reconstruct::{DomainPath, PathKind, PathSegment};
pub use registry::{TableRegistry, TableRegistryBuilder};
pub use report::{DomainResult, Report, RequestReport};
#[cfg(feature = "sqlite")]
pub use sqlite::{PoolConfig, SqliteExecutor};
pub use table::Table;
