#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use fieldgate::request::predicate::is_coordinates;
use fieldgate::request::{
    DomainConfig, DomainRegistry, FieldConfiguration, FilterCapabilities, ObjectField, QueryLimits, Tree,
    TypePredicate,
};
use fieldgate::sql::convert::{bool_to_int, int_to_bool};
use fieldgate::sql::literal;
use fieldgate::sql::{
    Column, FieldMapping, ForeignKey, JoinTable, PoolConfig, SqliteExecutor, TableDef, TableMapping, TableRegistry,
};
use fieldgate::{DatabaseConfig, DomainContext, FieldgateConfig};
use serde_json::{Value, json};

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, login TEXT NOT NULL)",
    "CREATE TABLE projects (id INTEGER PRIMARY KEY, title TEXT NOT NULL, budget_amount REAL, \
     budget_currency TEXT, owner_id INTEGER, lat REAL NOT NULL, lon REAL NOT NULL)",
    "CREATE TABLE tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE project_tags (project_id INTEGER NOT NULL, tag_id INTEGER NOT NULL)",
    "CREATE TABLE milestones (id INTEGER PRIMARY KEY, project_id INTEGER NOT NULL, title TEXT NOT NULL, due TEXT)",
    "CREATE TABLE tasks (id INTEGER PRIMARY KEY, milestone_id INTEGER NOT NULL, label TEXT NOT NULL, done INTEGER NOT NULL)",
    "INSERT INTO users VALUES (1, 'ada'), (2, 'linus')",
    "INSERT INTO projects VALUES \
     (1, 'Apollo', 1000.0, 'EUR', 1, 48.85, 2.35), \
     (2, 'Gemini', 250.5, 'USD', 2, 40.71, -74.0), \
     (3, 'Mercury', 80.0, 'EUR', 1, 51.5, -0.12)",
    "INSERT INTO tags VALUES (1, 'space'), (2, 'legacy')",
    "INSERT INTO project_tags VALUES (1, 1), (2, 1), (2, 2)",
    "INSERT INTO milestones VALUES (1, 1, 'design', '2024-01-01'), (2, 1, 'launch', '2024-06-01'), \
     (3, 2, 'orbit', '2024-03-01')",
    "INSERT INTO tasks VALUES (1, 1, 'sketch', 1), (2, 1, 'review', 0), (3, 2, 'countdown', 0), (4, 3, 'dock', 1)",
];

/// Squared planar distance to `data.{latitude, longitude}`.
fn distance(alias: &str, data: &Tree) -> Option<String> {
    let coordinate = |key: &str| data.get(key)?.as_scalar()?.as_f64();
    let (lat, lon) = (coordinate("latitude")?, coordinate("longitude")?);
    let (lat, lon) = (literal::number(lat), literal::number(lon));
    Some(format!(
        "(({alias}.lat - {lat}) * ({alias}.lat - {lat}) + ({alias}.lon - {lon}) * ({alias}.lon - {lon}))"
    ))
}

fn project_schema(manager: bool) -> DomainConfig {
    let currency = if manager {
        FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::new().by_list())
    } else {
        FieldConfiguration::restricted(TypePredicate::String, FilterCapabilities::new().by_list(), ["EUR"])
    };
    let mut fields = ObjectField::new()
        .with("id", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL))
        .with("title", FieldConfiguration::leaf(TypePredicate::String, FilterCapabilities::NONE))
        .with(
            "budget",
            FieldConfiguration::object(
                ObjectField::new()
                    .with("amount", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL))
                    .with("currency", currency),
            ),
        )
        .with(
            "distance",
            FieldConfiguration::computed(TypePredicate::Number, FilterCapabilities::new().by_range(), is_coordinates),
        )
        .with("tags", FieldConfiguration::one_to_many("tag"))
        .with("milestones", FieldConfiguration::one_to_many("milestone"));
    if manager {
        fields = fields.with("owner", FieldConfiguration::one_to_one("user"));
    }
    DomainConfig::new("project", ["id"], fields).unwrap()
}

fn leaf_schema(name: &str, leaves: &[(&str, TypePredicate)], links: &[(&str, &str)]) -> DomainConfig {
    let mut fields = ObjectField::new().with("id", FieldConfiguration::leaf(TypePredicate::Number, FilterCapabilities::ALL));
    for (leaf, predicate) in leaves {
        fields = fields.with(*leaf, FieldConfiguration::leaf(*predicate, FilterCapabilities::ALL));
    }
    for (field, domain) in links {
        fields = fields.with(*field, FieldConfiguration::one_to_many(*domain));
    }
    DomainConfig::new(name, ["id"], fields).unwrap()
}

fn domains() -> DomainRegistry {
    let mut builder = DomainRegistry::builder();
    for (role, manager) in [("manager", true), ("viewer", false)] {
        builder = builder
            .register(role, project_schema(manager))
            .unwrap()
            .register(role, leaf_schema("user", &[("login", TypePredicate::String)], &[]))
            .unwrap()
            .register(role, leaf_schema("tag", &[("name", TypePredicate::String)], &[]))
            .unwrap()
            .register(
                role,
                leaf_schema(
                    "milestone",
                    &[("title", TypePredicate::String), ("due", TypePredicate::IsoDate)],
                    &[("tasks", "task")],
                ),
            )
            .unwrap()
            .register(
                role,
                leaf_schema("task", &[("label", TypePredicate::String), ("done", TypePredicate::Boolean)], &[]),
            )
            .unwrap();
    }
    builder.build().unwrap()
}

fn simple(table: &str, columns: &[&str]) -> TableMapping {
    columns.iter().fold(
        TableMapping::new(TableDef::new(table, "id")).with("id", FieldMapping::column("id")),
        |mapping, column| mapping.with(*column, FieldMapping::column(*column)),
    )
}

fn tables(executor: SqliteExecutor) -> TableRegistry {
    let user = simple("users", &["login"]);
    let project = simple("projects", &["title"])
        .with(
            "budget",
            FieldMapping::object([
                ("amount", FieldMapping::column("budget_amount")),
                ("currency", FieldMapping::column("budget_currency")),
            ]),
        )
        .with("distance", FieldMapping::computed(distance))
        .with("owner", FieldMapping::one_to_one(Arc::new(simple("users", &["login"])), ForeignKey::new("owner_id", "id")))
        .with(
            "tags",
            FieldMapping::many_to_many("tag", ForeignKey::new("id", "id"), JoinTable::new("project_tags", "project_id", "tag_id")),
        )
        .with("milestones", FieldMapping::one_to_many("milestone", ForeignKey::new("id", "project_id")));
    let milestone = simple("milestones", &["title", "due"])
        .with("tasks", FieldMapping::one_to_many("task", ForeignKey::new("id", "milestone_id")));
    let task = simple("tasks", &["label"]).with(
        "done",
        FieldMapping::converted(Column::new("done").with_to_db(bool_to_int).with_to_domain(int_to_bool)),
    );
    TableRegistry::builder()
        .register("project", project)
        .unwrap()
        .register("user", user)
        .unwrap()
        .register("tag", simple("tags", &["name"]))
        .unwrap()
        .register("milestone", milestone)
        .unwrap()
        .register("task", task)
        .unwrap()
        .build(Arc::new(executor))
        .unwrap()
}

async fn context() -> DomainContext {
    let database = DatabaseConfig {
        dsn: "sqlite::memory:".to_owned(),
        pool: PoolConfig::default(),
    };
    let executor = database.connect().await.unwrap();
    for statement in SCHEMA {
        sqlx::query(statement).execute(executor.pool()).await.unwrap();
    }
    let config = FieldgateConfig {
        limits: QueryLimits::new().with_default_limit(2),
        database: Some(database),
        ..FieldgateConfig::default()
    };
    DomainContext::from_config(domains(), tables(executor), &config)
}

async fn query(ctx: &DomainContext, role: &str, input: Value) -> Value {
    let result = ctx.query("project", role, &Tree::from(input)).await.unwrap();
    assert_eq!(result.report.failures().count(), 0, "{:?}", result.report);
    result.to_wire()
}

fn titles(wire: &Value) -> Vec<&str> {
    wire["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn whole_tree_is_rebuilt_across_rounds() {
    let ctx = context().await;
    let wire = query(
        &ctx,
        "manager",
        json!({
            "fields": {
                "title": true,
                "budget": true,
                "owner": {"login": true},
                "tags": {"name": true},
                "milestones": {"title": true, "tasks": {"label": true, "done": true}}
            },
            "options": {"orderby": "title asc"}
        }),
    )
    .await;
    assert_eq!(wire["total"], 3);
    assert_eq!(titles(&wire), vec!["Apollo", "Gemini"]);
    assert_eq!(
        wire["results"][0],
        json!({
            "id": 1,
            "title": "Apollo",
            "budget": {"amount": 1000.0, "currency": "EUR"},
            "owner": {"login": "ada"},
            "tags": [{"id": 1, "name": "space"}],
            "milestones": [
                {"id": 1, "title": "design", "tasks": [
                    {"id": 1, "label": "sketch", "done": true},
                    {"id": 2, "label": "review", "done": false}
                ]},
                {"id": 2, "title": "launch", "tasks": [{"id": 3, "label": "countdown", "done": false}]}
            ]
        })
    );
    assert_eq!(
        wire["results"][1]["tags"],
        json!([{"id": 1, "name": "space"}, {"id": 2, "name": "legacy"}])
    );
    assert_eq!(wire["errors"], json!([]));
}

#[tokio::test]
async fn restriction_inside_an_object_applies_by_default() {
    let ctx = context().await;
    let wire = query(
        &ctx,
        "viewer",
        json!({"fields": {"title": true, "budget": {"currency": true}, "owner": {"login": true}}, "options": {"limit": 10}}),
    )
    .await;
    assert_eq!(wire["total"], 2);
    assert_eq!(titles(&wire), vec!["Apollo", "Mercury"]);
    assert_eq!(wire["results"][1]["budget"], json!({"currency": "EUR"}));
    assert_eq!(wire["errors"].as_array().unwrap().len(), 1);
    assert_eq!(wire["errors"][0]["field_name"], "owner");
}

#[tokio::test]
async fn computed_field_filters_orders_and_projects() {
    let ctx = context().await;
    let paris = json!({"latitude": 48.85, "longitude": 2.35});
    let wire = query(
        &ctx,
        "manager",
        json!({
            "fields": {"title": true, "distance": true},
            "filters": {"distance": {"operator": "lesser_than", "value": 20, "data": paris}},
            "options": {"orderby": "distance desc"}
        }),
    )
    .await;
    assert_eq!(wire["total"], 2);
    assert_eq!(titles(&wire), vec!["Mercury", "Apollo"]);
    assert_eq!(wire["results"][1]["distance"], json!(0.0));
}

#[tokio::test]
async fn filtered_children_share_one_page() {
    let ctx = context().await;
    let wire = query(
        &ctx,
        "manager",
        json!({
            "fields": {"title": true, "milestones": {"title": true}},
            "filters": {"milestones": {"due": {"operator": "greater_than", "value": "2024-02-01"}}},
            "options": {"limit": 5, "milestones": {"use_filter": true, "orderby": "due desc", "limit": 1}}
        }),
    )
    .await;
    assert_eq!(wire["total"], 3);
    // one child round for the whole page: its limit spans every parent
    assert_eq!(wire["results"][0]["milestones"], json!([{"id": 2, "title": "launch"}]));
    assert_eq!(wire["results"][1]["milestones"], json!([]));
    assert_eq!(wire["results"][2]["milestones"], json!([]));
}

#[tokio::test]
async fn child_filter_without_use_filter_restricts_parents() {
    let ctx = context().await;
    let wire = query(
        &ctx,
        "manager",
        json!({
            "fields": {"title": true},
            "filters": {"tags": {"name": {"operator": "equals", "value": "legacy"}}}
        }),
    )
    .await;
    assert_eq!(wire["total"], 1);
    assert_eq!(titles(&wire), vec!["Gemini"]);
}

#[tokio::test]
async fn inner_relation_options_apply_below_an_unfiltered_relation() {
    let ctx = context().await;
    let wire = query(
        &ctx,
        "manager",
        json!({
            "fields": {"title": true, "milestones": {"title": true, "tasks": {"label": true}}},
            "options": {
                "limit": 1,
                "orderby": "title asc",
                "milestones": {"tasks": {"use_filter": true, "orderby": "label asc", "limit": 1}}
            }
        }),
    )
    .await;
    assert_eq!(titles(&wire), vec!["Apollo"]);
    assert_eq!(
        wire["results"][0]["milestones"],
        json!([
            {"id": 1, "title": "design", "tasks": []},
            {"id": 2, "title": "launch", "tasks": [{"id": 3, "label": "countdown"}]}
        ])
    );
    assert_eq!(wire["errors"], json!([]));
}
