#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(feature = "sqlite")]

use std::sync::Arc;

use fieldgate_request::{
    DomainConfig, DomainRegistry, FieldConfiguration, FilterCapabilities, ObjectField, QueryLimits, Tree,
    TypePredicate,
};
use fieldgate_sql::{
    FieldMapping, ForeignKey, JoinTable, PoolConfig, SqliteExecutor, TableDef, TableMapping, TableRegistry,
};
use serde_json::{Value, json};

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, login TEXT NOT NULL)",
    "CREATE TABLE tickets (id INTEGER PRIMARY KEY, name TEXT NOT NULL, status TEXT NOT NULL, \
     created_at TEXT NOT NULL, author_id INTEGER REFERENCES users(id), urgent INTEGER NOT NULL DEFAULT 0)",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY, ticket_id INTEGER NOT NULL, body TEXT NOT NULL)",
    "CREATE TABLE labels (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
    "CREATE TABLE ticket_labels (ticket_id INTEGER NOT NULL, label_id INTEGER NOT NULL)",
    "INSERT INTO users VALUES (1, 'ada'), (2, 'linus')",
    "INSERT INTO tickets VALUES \
     (1, 'A', 'opened', '2024-01-10', 1, 1), \
     (2, 'B', 'closed', '2024-02-10', 2, 0), \
     (3, 'C', 'opened', '2024-03-10', NULL, 0), \
     (4, 'D', 'work in progress', '2024-04-10', 1, 1)",
    "INSERT INTO comments VALUES (1, 1, 'first'), (2, 1, 'second'), (3, 4, 'on it'), (4, 2, 'done')",
    "INSERT INTO labels VALUES (1, 'bug'), (2, 'ui')",
    "INSERT INTO ticket_labels VALUES (1, 1), (1, 2), (3, 2)",
];

async fn executor() -> SqliteExecutor {
    let executor = SqliteExecutor::connect("sqlite::memory:", &PoolConfig::default())
        .await
        .unwrap();
    for statement in SCHEMA {
        sqlx::query(statement).execute(executor.pool()).await.unwrap();
    }
    executor
}

fn ticket_config(statuses: Option<&[&str]>) -> DomainConfig {
    let status = match statuses {
        Some(values) => {
            FieldConfiguration::restricted(TypePredicate::String, FilterCapabilities::new().by_list(), values.iter().copied())
        }
        None => FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::new().by_list()),
    };
    DomainConfig::new(
        "ticket",
        ["id"],
        ObjectField::new()
            .with("id", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL))
            .with("name", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
            .with("status", status)
            .with("createdAt", FieldConfiguration::leaf(TypePredicate::IsoDate, FilterCapabilities::ALL))
            .with("urgent", FieldConfiguration::leaf(TypePredicate::Boolean, FilterCapabilities::NONE))
            .with("author", FieldConfiguration::one_to_one("user"))
            .with("comments", FieldConfiguration::one_to_many("comment"))
            .with("labels", FieldConfiguration::one_to_many("label")),
    )
    .unwrap()
}

fn simple_config(name: &str, field: &str) -> DomainConfig {
    DomainConfig::new(
        name,
        ["id"],
        ObjectField::new()
            .with("id", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL))
            .with(field, FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE)),
    )
    .unwrap()
}

fn restricted_config(name: &str, field: &str, values: &[&str]) -> DomainConfig {
    DomainConfig::new(
        name,
        ["id"],
        ObjectField::new()
            .with("id", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL))
            .with(
                field,
                FieldConfiguration::restricted(TypePredicate::String, FilterCapabilities::NONE, values.iter().copied()),
            ),
    )
    .unwrap()
}

fn domains() -> DomainRegistry {
    let mut builder = DomainRegistry::builder();
    for (role, statuses) in [("student", Some(&["opened", "work in progress"][..])), ("teacher", None)] {
        builder = builder
            .register(role, ticket_config(statuses))
            .unwrap()
            .register(role, simple_config("user", "login"))
            .unwrap()
            .register(role, simple_config("comment", "body"))
            .unwrap()
            .register(role, simple_config("label", "label"))
            .unwrap();
    }
    // restrictions live on the linked domains only
    builder
        .register("visitor", ticket_config(None))
        .unwrap()
        .register("visitor", restricted_config("user", "login", &["ada"]))
        .unwrap()
        .register("visitor", restricted_config("comment", "body", &["first", "on it"]))
        .unwrap()
        .register("visitor", simple_config("label", "label"))
        .unwrap()
        .build()
        .unwrap()
}

fn user_mapping() -> TableMapping {
    TableMapping::new(TableDef::new("users", "id"))
        .with("id", FieldMapping::column("id"))
        .with("login", FieldMapping::column("login"))
}

async fn tables() -> TableRegistry {
    let ticket = TableMapping::new(TableDef::new("tickets", "id"))
        .with("id", FieldMapping::column("id"))
        .with("name", FieldMapping::column("name"))
        .with("status", FieldMapping::column("status"))
        .with("createdAt", FieldMapping::column("created_at"))
        .with(
            "urgent",
            FieldMapping::converted(
                fieldgate_sql::Column::new("urgent")
                    .with_to_db(fieldgate_sql::convert::bool_to_int)
                    .with_to_domain(fieldgate_sql::convert::int_to_bool),
            ),
        )
        .with("author", FieldMapping::one_to_one(Arc::new(user_mapping()), ForeignKey::new("author_id", "id")))
        .with("comments", FieldMapping::one_to_many("comment", ForeignKey::new("id", "ticket_id")))
        .with(
            "labels",
            FieldMapping::many_to_many(
                "label",
                ForeignKey::new("id", "id"),
                JoinTable::new("ticket_labels", "ticket_id", "label_id"),
            ),
        );
    let comment = TableMapping::new(TableDef::new("comments", "id"))
        .with("id", FieldMapping::column("id"))
        .with("body", FieldMapping::column("body"));
    let label = TableMapping::new(TableDef::new("labels", "id"))
        .with("id", FieldMapping::column("id"))
        .with("label", FieldMapping::column("label"));
    TableRegistry::builder()
        .register("ticket", ticket)
        .unwrap()
        .register("user", user_mapping())
        .unwrap()
        .register("comment", comment)
        .unwrap()
        .register("label", label)
        .unwrap()
        .build(Arc::new(executor().await))
        .unwrap()
}

async fn query(role: &str, input: Value) -> Value {
    let built = domains()
        .request_builder("ticket", role, QueryLimits::default())
        .unwrap()
        .build(&Tree::from(input))
        .unwrap();
    let result = tables().await.fetch(&built.request).await.unwrap();
    assert_eq!(result.report.failures().count(), 0, "{:?}", result.report);
    result.with_errors(built.errors).to_wire()
}

fn names(wire: &Value) -> Vec<&str> {
    wire["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn restricted_role_only_sees_authorized_statuses() {
    let wire = query("student", json!({"fields": {"name": true, "status": true}})).await;
    assert_eq!(wire["total"], 3);
    assert_eq!(names(&wire), vec!["A", "C", "D"]);
    let statuses: Vec<&str> = wire["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["opened", "opened", "work in progress"]);
    assert_eq!(wire["errors"], json!([]));
}

#[tokio::test]
async fn explicit_authorized_filter_narrows() {
    let wire = query(
        "student",
        json!({"fields": {"name": true}, "filters": {"status": {"operator": "equals", "value": "opened"}}}),
    )
    .await;
    assert_eq!(wire["total"], 2);
    assert_eq!(names(&wire), vec!["A", "C"]);
}

#[tokio::test]
async fn unauthorized_filter_is_reported_and_defaults_apply() {
    let wire = query(
        "student",
        json!({"fields": {"name": true}, "filters": {"status": {"operator": "equals", "value": "closed"}}}),
    )
    .await;
    assert_eq!(wire["total"], 3);
    assert_eq!(wire["errors"].as_array().unwrap().len(), 1);
    assert_eq!(wire["errors"][0]["field_name"], "status");
}

#[tokio::test]
async fn or_with_restricted_field_keeps_restriction() {
    let wire = query(
        "student",
        json!({
            "fields": {"name": true},
            "filters": {"or": [
                {"status": {"operator": "equals", "value": "opened"}},
                {"name": {"operator": "equals", "value": "B"}}
            ]}
        }),
    )
    .await;
    assert_eq!(names(&wire), vec!["A", "C"]);
}

#[tokio::test]
async fn and_bucket_narrows_the_or_alternatives() {
    let wire = query(
        "teacher",
        json!({
            "fields": {"name": true},
            "filters": {
                "and": [{"status": {"operator": "equals", "value": "opened"}}],
                "or": [
                    {"name": {"operator": "equals", "value": "A"}},
                    {"name": {"operator": "equals", "value": "B"}}
                ]
            }
        }),
    )
    .await;
    assert_eq!(wire["total"], 1);
    assert_eq!(names(&wire), vec!["A"]);
}

#[tokio::test]
async fn unrestricted_role_sees_everything() {
    let wire = query("teacher", json!({"fields": {"name": true}})).await;
    assert_eq!(wire["total"], 4);
    assert_eq!(names(&wire), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn joins_relations_and_converters() {
    let wire = query(
        "teacher",
        json!({
            "fields": {"name": true, "urgent": true, "author": {"login": true}, "comments": {"body": true}, "labels": {"label": true}},
            "filters": {"created_at": {"operator": "lesser_than", "value": "2024-03-01"}},
            "options": {"orderby": "name desc"}
        }),
    )
    .await;
    assert_eq!(wire["total"], 2);
    assert_eq!(
        wire["results"],
        json!([
            {"id": 2, "name": "B", "urgent": false, "author": {"login": "linus"}, "comments": [{"id": 4, "body": "done"}], "labels": []},
            {"id": 1, "name": "A", "urgent": true, "author": {"login": "ada"},
             "comments": [{"id": 1, "body": "first"}, {"id": 2, "body": "second"}],
             "labels": [{"id": 1, "label": "bug"}, {"id": 2, "label": "ui"}]}
        ])
    );
}

#[tokio::test]
async fn missing_one_to_one_leaves_an_empty_object() {
    let wire = query(
        "teacher",
        json!({"fields": {"name": true, "author": {"login": true}}, "filters": {"name": {"operator": "equals", "value": "C"}}}),
    )
    .await;
    assert_eq!(wire["results"], json!([{"id": 3, "name": "C", "author": {}}]));
}

#[tokio::test]
async fn selected_one_to_one_applies_target_restrictions() {
    let wire = query("visitor", json!({"fields": {"name": true, "author": {"login": true}}})).await;
    assert_eq!(wire["total"], 2);
    assert_eq!(
        wire["results"],
        json!([
            {"id": 1, "name": "A", "author": {"login": "ada"}},
            {"id": 4, "name": "D", "author": {"login": "ada"}}
        ])
    );
    assert_eq!(wire["errors"], json!([]));

    // not selected, not restricted
    let unselected = query("visitor", json!({"fields": {"name": true}})).await;
    assert_eq!(unselected["total"], 4);
}

#[tokio::test]
async fn selected_one_to_many_hides_unauthorized_children() {
    let wire = query("visitor", json!({"fields": {"name": true, "comments": {"body": true}}})).await;
    assert_eq!(wire["total"], 4);
    assert_eq!(names(&wire), vec!["A", "B", "C", "D"]);
    let comments: Vec<&Value> = wire["results"].as_array().unwrap().iter().map(|r| &r["comments"]).collect();
    assert_eq!(
        comments,
        vec![
            &json!([{"id": 1, "body": "first"}]),
            &json!([]),
            &json!([]),
            &json!([{"id": 3, "body": "on it"}])
        ]
    );
}

#[tokio::test]
async fn relation_filter_restricts_parents_or_children() {
    let parents = query(
        "teacher",
        json!({
            "fields": {"name": true},
            "filters": {"comments": {"body": {"operator": "contains", "value": "on"}}}
        }),
    )
    .await;
    assert_eq!(names(&parents), vec!["A", "B", "D"]);

    let children = query(
        "teacher",
        json!({
            "fields": {"name": true, "comments": {"body": true}},
            "filters": {"comments": {"body": {"operator": "contains", "value": "s"}}},
            "options": {"comments": {"use_filter": true, "orderby": "body desc"}}
        }),
    )
    .await;
    assert_eq!(children["total"], 4);
    assert_eq!(
        children["results"][0]["comments"],
        json!([{"id": 2, "body": "second"}, {"id": 1, "body": "first"}])
    );
    assert_eq!(children["results"][2]["comments"], json!([]));
}

#[tokio::test]
async fn pagination_and_total() {
    let wire = query(
        "teacher",
        json!({"fields": {"name": true}, "options": {"limit": 2, "offset": 1, "orderby": "created_at asc"}}),
    )
    .await;
    assert_eq!(wire["total"], 4);
    assert_eq!(names(&wire), vec!["B", "C"]);
}

#[tokio::test]
async fn no_selection_runs_no_sql() {
    let built = domains()
        .request_builder("ticket", "teacher", QueryLimits::default())
        .unwrap()
        .build(&Tree::empty())
        .unwrap();
    let result = tables().await.fetch(&built.request).await.unwrap();
    assert!(result.report.is_empty());
    assert_eq!(result.total, 0);
    assert!(result.results.is_empty());
}
