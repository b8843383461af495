//! Fetch execution.
//!
//! Rounds run in a fixed order: `COUNT(*)`, the primary `SELECT`, then one round per
//! one-to-many relation (concurrently for siblings, recursively for nested ones).
//! A failing round never aborts the fetch: it is logged, recorded in the report and
//! contributes no rows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use fieldgate_request::DomainRequest;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::MappingError;
use crate::executor::{Row, SqlExecutor};
use crate::literal;
use crate::mapping::TableMapping;
use crate::plan::{PARENT_KEY, Plan, RelationPlan, plan};
use crate::reconstruct::{append, key_of, populate};
use crate::report::{DomainResult, Report, RequestReport};

type Children = HashMap<String, Vec<Value>>;

/// One domain's mapping bound to an executor.
#[derive(Clone)]
pub struct Table {
    mapping: Arc<TableMapping>,
    executor: Arc<dyn SqlExecutor>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("table", &self.mapping.table.name)
            .finish_non_exhaustive()
    }
}

impl Table {
    pub fn new(mapping: Arc<TableMapping>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self { mapping, executor }
    }

    #[must_use]
    pub fn mapping(&self) -> &Arc<TableMapping> {
        &self.mapping
    }

    /// Run `request` and rebuild its nested results.
    ///
    /// # Errors
    /// Only [`MappingError`]s, raised before any SQL runs. Statement failures are
    /// recorded in [`DomainResult::report`].
    #[instrument(skip_all, fields(domain = %request.name(), table = %self.mapping.table.name))]
    pub async fn fetch(&self, request: &DomainRequest) -> Result<DomainResult, MappingError> {
        let Some(plan) = plan(&self.mapping, request)? else {
            return Ok(DomainResult::empty(request.name()));
        };
        let mut report = Report::default();

        let (count_rows, count_report) = self.run(plan.count_sql()).await;
        let counted = count_report.error.is_none();
        report.push(count_report);
        let total = if counted { parse_total(&count_rows) } else { 0 };

        let (rows, select_report) = self.run(plan.sql()).await;
        report.push(select_report);
        let (results, nested) = self.materialize(&plan, rows).await;
        report.extend(nested);

        info!(
            total,
            results = results.len(),
            rounds = report.requests.len(),
            failed = report.failures().count(),
            "fetch complete"
        );
        Ok(DomainResult {
            domain_name: request.name().to_owned(),
            results,
            report,
            total,
            errors: Vec::new(),
        })
    }

    async fn run(&self, sql: String) -> (Vec<Row>, RequestReport) {
        debug!(%sql, "executing");
        let started = Instant::now();
        let outcome = self.executor.select(&sql).await;
        let time_in_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(rows) => (
                rows,
                RequestReport {
                    request: sql,
                    time_in_ms,
                    error: None,
                },
            ),
            Err(err) => {
                warn!(error = %err, %sql, "statement failed");
                (
                    Vec::new(),
                    RequestReport {
                        request: sql,
                        time_in_ms,
                        error: Some(format!("{err:#}")),
                    },
                )
            }
        }
    }

    /// Result objects of `rows`, with every relation of `plan` fetched and attached.
    fn materialize<'a>(&'a self, plan: &'a Plan, rows: Vec<Row>) -> BoxFuture<'a, (Vec<Value>, Vec<RequestReport>)> {
        async move {
            let mut results: Vec<Value> = rows.iter().map(|row| plan.build_object(row)).collect();
            let outcomes = join_all(plan.relations().iter().map(|r| self.fetch_relation(r, &rows))).await;

            let mut reports = Vec::new();
            for (relation, (children, relation_reports)) in plan.relations().iter().zip(outcomes) {
                reports.extend(relation_reports);
                for (result, row) in results.iter_mut().zip(&rows) {
                    // parents without children still get an empty array
                    populate(result, relation.path(), Value::Null);
                    let Some(key) = row.get(relation.key_alias()).and_then(key_of) else {
                        continue;
                    };
                    for child in children.get(&key).into_iter().flatten() {
                        append(result, relation.path(), child.clone());
                    }
                }
            }
            (results, reports)
        }
        .boxed()
    }

    fn fetch_relation<'a>(
        &'a self,
        relation: &'a RelationPlan,
        parents: &'a [Row],
    ) -> BoxFuture<'a, (Children, Vec<RequestReport>)> {
        async move {
            let mut seen = HashSet::new();
            let keys: Vec<String> = parents
                .iter()
                .filter_map(|row| row.get(relation.key_alias()))
                .filter_map(literal::json)
                .filter(|key| seen.insert(key.clone()))
                .collect();
            if keys.is_empty() {
                debug!(relation = %relation.path().dotted(), "no parent keys, round skipped");
                return (Children::new(), Vec::new());
            }

            let (rows, report) = self.run(relation.sql(&keys)).await;
            let parent_keys: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.get(PARENT_KEY).and_then(key_of))
                .collect();
            let (objects, nested) = self.materialize(relation.child(), rows).await;

            let mut children = Children::new();
            for (key, object) in parent_keys.into_iter().zip(objects) {
                if let Some(key) = key {
                    children.entry(key).or_default().push(object);
                }
            }
            let mut reports = vec![report];
            reports.extend(nested);
            (children, reports)
        }
        .boxed()
    }
}

fn parse_total(rows: &[Row]) -> u64 {
    rows.first()
        .and_then(|row| row.get("total"))
        .and_then(|total| match total {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}
