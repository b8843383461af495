#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Fieldgate
//!
//! Role-aware querying of relational data in two steps: a per-role schema sanitizes the
//! untrusted `{fields, filters, options}` input ([`fieldgate_request`]), then table mappings
//! turn the sanitized request into SQL and nested results ([`fieldgate_sql`]).
//!
//! This crate wires both halves into a [`DomainContext`] and adds the start-up plumbing:
//! [`FieldgateConfig`] (figment: defaults, YAML, `FIELDGATE__*` env) and
//! [`telemetry::init_logging`].
//!
//! ```ignore
//! let config = FieldgateConfig::load("config/fieldgate.yaml")?;
//! telemetry::init_logging(&config.logging)?;
//! let executor = config.database.as_ref().context("no database section")?.connect().await?;
//! let tables = TableRegistry::builder()
//!     .register("ticket", ticket_mapping())?
//!     .build(Arc::new(executor))?;
//! let ctx = DomainContext::from_config(domains(), tables, &config);
//! let result = ctx.query("ticket", "student", &Tree::from(body)).await?;
//! ```

pub use fieldgate_request as request;
pub use fieldgate_sql as sql;

pub mod config;
pub mod context;
pub mod telemetry;

pub use config::{ConfigLoadError, DatabaseConfig, FieldgateConfig};
pub use context::{ContextError, DomainContext};
pub use fieldgate_request::{DomainRegistry, InputError, QueryLimits, Tree};
pub use fieldgate_sql::{DomainResult, TableRegistry};
