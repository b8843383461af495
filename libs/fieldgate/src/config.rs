//! Typed fieldgate configuration.
//!
//! Everything lives under one `fieldgate` section:
//!
//! ```yaml
//! fieldgate:
//!   limits:
//!     default_limit: 50
//!     max_limit: 1000
//!   logging:
//!     level: "info,fieldgate_sql=debug"
//!     format: json
//!   database:
//!     dsn: "sqlite://tickets.db"
//!     pool:
//!       max_conns: 8
//! ```
//!
//! A missing section, or a missing key inside it, falls back to the defaults.

use std::path::Path;

use fieldgate_request::QueryLimits;
use fieldgate_sql::{PoolConfig, SqliteExecutor};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::telemetry::LoggingConfig;

/// Section holding the fieldgate configuration.
pub const SECTION: &str = "fieldgate";
/// Environment override prefix: `FIELDGATE__LIMITS__MAX_LIMIT=1000`.
pub const ENV_PREFIX: &str = "FIELDGATE__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("invalid fieldgate configuration: {0}")]
    Invalid(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigLoadError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldgateConfig {
    pub limits: QueryLimits,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub dsn: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl DatabaseConfig {
    /// Open the pool described by this section.
    ///
    /// # Errors
    /// Any `sqlx` error raised while connecting.
    pub async fn connect(&self) -> Result<SqliteExecutor, sqlx::Error> {
        SqliteExecutor::connect(&self.dsn, &self.pool).await
    }
}

impl FieldgateConfig {
    /// Extract the `fieldgate` section of `figment`, or the defaults when it is absent.
    ///
    /// # Errors
    /// `ConfigLoadError::Invalid` when the section does not match the schema.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigLoadError> {
        if !figment.contains(SECTION) {
            return Ok(Self::default());
        }
        Ok(figment.extract_inner(SECTION)?)
    }

    /// Defaults, then the YAML file at `path` (when it exists), then `FIELDGATE__*` variables.
    ///
    /// # Errors
    /// `ConfigLoadError::Invalid` when a layer does not parse or match the schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let figment = Figment::new()
            .merge(Serialized::default(SECTION, Self::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .split("__")
                    .map(|key| format!("{SECTION}.{key}").into()),
            );
        let config = Self::from_figment(&figment)?;
        tracing::debug!(path = %path.as_ref().display(), ?config.limits, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::telemetry::LogFormat;
    use serde_json::json;
    use std::io::Write;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_section_gives_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({"server": {"port": 8080}})));
        let config = FieldgateConfig::from_figment(&figment).unwrap();
        assert_eq!(config, FieldgateConfig::default());
        assert_eq!(config.limits.max_limit, 5000);
    }

    #[test]
    fn partial_section_merges_with_defaults() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "fieldgate": {"limits": {"max_limit": 250}, "logging": {"format": "json"}}
        })));
        let config = FieldgateConfig::from_figment(&figment).unwrap();
        assert_eq!(config.limits.max_limit, 250);
        assert_eq!(config.limits.default_limit, 100);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.database.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "fieldgate": {"limits": {"max": 10}}
        })));
        let err = FieldgateConfig::from_figment(&figment).unwrap_err();
        assert!(err.to_string().starts_with("invalid fieldgate configuration"));
    }

    #[test]
    fn yaml_then_env_layers() {
        let file = yaml_file(
            "fieldgate:\n  limits:\n    default_limit: 20\n    max_limit: 40\n  database:\n    dsn: \"sqlite::memory:\"\n",
        );
        temp_env::with_var("FIELDGATE__LIMITS__MAX_LIMIT", Some("30"), || {
            let config = FieldgateConfig::load(file.path()).unwrap();
            assert_eq!(config.limits.default_limit, 20);
            assert_eq!(config.limits.max_limit, 30);
            assert_eq!(config.database.unwrap().dsn, "sqlite::memory:");
        });
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FieldgateConfig::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
