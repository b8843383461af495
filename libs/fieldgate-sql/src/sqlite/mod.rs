//! `SQLite` executor over a `sqlx` pool.
//!
//! Rows are decoded by the runtime storage class of each value, so computed
//! projections (`COUNT(*)`, expressions) decode the same way as plain columns.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use crate::executor::{Row, SqlExecutor};

/// Pool tuning. Unset values keep the `sqlx` defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub max_conns: Option<u32>,
    pub min_conns: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub max_lifetime_ms: Option<u64>,
}

impl PoolConfig {
    fn apply(&self, mut options: SqlitePoolOptions) -> SqlitePoolOptions {
        if let Some(n) = self.max_conns {
            options = options.max_connections(n);
        }
        if let Some(n) = self.min_conns {
            options = options.min_connections(n);
        }
        if let Some(ms) = self.acquire_timeout_ms {
            options = options.acquire_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.idle_timeout_ms {
            options = options.idle_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_lifetime_ms {
            options = options.max_lifetime(Duration::from_millis(ms));
        }
        options
    }
}

/// True for DSNs that open a private in-memory database per connection.
#[must_use]
pub fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool on `dsn`.
    ///
    /// In-memory databases are pinned to a single long-lived connection, otherwise
    /// every pooled connection would see its own empty database.
    ///
    /// # Errors
    /// Any `sqlx` connection error.
    pub async fn connect(dsn: &str, config: &PoolConfig) -> Result<Self, sqlx::Error> {
        let mut options = config.apply(SqlitePoolOptions::new());
        if is_memory_dsn(dsn) {
            options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(dsn).await?;
        debug!(dsn, "sqlite pool ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn select(&self, sql: &str) -> anyhow::Result<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| decode_row(row).map_err(anyhow::Error::from))
            .collect()
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
                "REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(index)?),
                "BLOB" => Value::from(String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(index)?).into_owned()),
                _ => Value::from(row.try_get::<String, _>(index)?),
            }
        };
        out.insert(column.name().to_owned(), value);
    }
    Ok(out)
}
