//! Per-fetch execution report and the final result.

use fieldgate_request::InputError;
use fieldgate_request::naming::keys_to_wire;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One SQL statement that was sent to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReport {
    pub request: String,
    pub time_in_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub requests: Vec<RequestReport>,
}

impl Report {
    pub fn push(&mut self, report: RequestReport) {
        self.requests.push(report);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Statements that failed, in execution order.
    pub fn failures(&self) -> impl Iterator<Item = &RequestReport> {
        self.requests.iter().filter(|r| r.error.is_some())
    }
}

impl Extend<RequestReport> for Report {
    fn extend<I: IntoIterator<Item = RequestReport>>(&mut self, iter: I) {
        self.requests.extend(iter);
    }
}

/// Outcome of fetching one domain request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    pub domain_name: String,
    /// Result objects keyed by internal field names.
    pub results: Vec<Value>,
    pub report: Report,
    /// Match count ignoring pagination; 0 when the count statement failed.
    pub total: u64,
    pub errors: Vec<InputError>,
}

impl DomainResult {
    pub fn empty(domain_name: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            results: Vec::new(),
            report: Report::default(),
            total: 0,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<InputError>) -> Self {
        self.errors = errors;
        self
    }

    /// Outbound wire form `{total, results, errors}` with snake_case result keys.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("total".into(), Value::from(self.total));
        map.insert(
            "results".into(),
            Value::Array(self.results.iter().cloned().map(keys_to_wire).collect()),
        );
        map.insert(
            "errors".into(),
            serde_json::to_value(&self.errors).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        Value::Object(map)
    }
}
