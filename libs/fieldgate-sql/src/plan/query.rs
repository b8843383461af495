//! Textual `SELECT` statement assembled by the planner.

use fieldgate_request::Pagination;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Join {
    alias: String,
    sql: String,
}

/// Parts of one `SELECT`; rendered as the primary statement or as its `COUNT(*)` twin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    from: String,
    projections: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<String>,
    order: Vec<String>,
    page: Option<Pagination>,
}

impl SelectQuery {
    /// `table` aliased as `alias`; the alias is dropped when both are equal.
    #[must_use]
    pub fn new(table: &str, alias: &str) -> Self {
        let from = if table == alias {
            table.to_owned()
        } else {
            format!("{table} AS {alias}")
        };
        Self {
            from,
            projections: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            page: None,
        }
    }

    pub fn project(&mut self, expression: &str, alias: &str) {
        self.projections.push(format!("{expression} AS {alias}"));
    }

    #[must_use]
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Add a join once per alias, keeping first-use order.
    pub fn join(&mut self, alias: &str, sql: String) {
        if !self.has_join(alias) {
            self.joins.push(Join {
                alias: alias.to_owned(),
                sql,
            });
        }
    }

    pub fn filter(&mut self, condition: String) {
        self.conditions.push(condition);
    }

    pub fn order_by(&mut self, term: String) {
        self.order.push(term);
    }

    pub fn paginate(&mut self, page: Pagination) {
        self.page = Some(page);
    }

    #[must_use]
    pub fn is_ordered_by(&self, expression: &str) -> bool {
        self.order
            .iter()
            .any(|t| t.strip_prefix(expression).is_some_and(|rest| rest.starts_with(' ')))
    }

    /// Primary statement. `extra` is `AND`ed in front of the planned conditions.
    #[must_use]
    pub fn render(&self, extra: Option<&str>) -> String {
        let mut parts = vec![format!("SELECT {}", self.projections.join(", "))];
        self.push_body(&mut parts, extra);
        if !self.order.is_empty() {
            parts.push(format!("ORDER BY {}", self.order.join(", ")));
        }
        if let Some(page) = self.page {
            parts.push(format!("LIMIT {}, {}", page.offset, page.limit));
        }
        parts.join(" ")
    }

    /// `SELECT COUNT(*) AS total` over the same rows, without order or pagination.
    #[must_use]
    pub fn render_count(&self) -> String {
        let mut parts = vec!["SELECT COUNT(*) AS total".to_owned()];
        self.push_body(&mut parts, None);
        parts.join(" ")
    }

    /// `SELECT {expression}` over the filtered rows, for `IN (...)` subqueries.
    #[must_use]
    pub fn render_subquery(&self, expression: &str) -> String {
        let mut parts = vec![format!("SELECT {expression}")];
        self.push_body(&mut parts, None);
        parts.join(" ")
    }

    fn push_body(&self, parts: &mut Vec<String>, extra: Option<&str>) {
        parts.push(format!("FROM {}", self.from));
        parts.extend(self.joins.iter().map(|j| j.sql.clone()));
        let conditions: Vec<&str> = extra
            .into_iter()
            .chain(self.conditions.iter().map(String::as_str))
            .collect();
        match conditions.as_slice() {
            [] => {}
            [single] => parts.push(format!("WHERE {single}")),
            many => parts.push(format!(
                "WHERE {}",
                many.iter().map(|c| format!("({c})")).collect::<Vec<_>>().join(" AND ")
            )),
        }
    }
}
