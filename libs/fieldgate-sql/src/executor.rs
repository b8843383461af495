use async_trait::async_trait;

/// One result row, keyed by the projection aliases of the statement.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Runs planned `SELECT` statements. Implementations own connection handling.
///
/// A failing statement is reported, not propagated: the engine records the error in
/// the fetch report and continues with an empty row set.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// # Errors
    /// Any driver error; it ends up in the report of the fetch.
    async fn select(&self, sql: &str) -> anyhow::Result<Vec<Row>>;
}
