//! Materialization of in-memory query results into nested JSON.

use cql::catalog::SchemaCatalog;
use cql::compile::{compile, query, CompileOptions};
use cql::exec::{Executor, MemoryStore};
use cql::materialize::materialize_all;
use serde_json::{json, Value};

fn github() -> SchemaCatalog {
    SchemaCatalog::from_toml_str(include_str!("../../demos/github.toml"))
        .expect("demo schema should load")
}

fn store() -> MemoryStore {
    MemoryStore::from_json(github(), include_str!("../../demos/github_data.json"))
        .expect("demo dataset should load")
}

fn run(source: &str) -> Vec<Value> {
    let store = store();
    query(source, store.catalog(), &&store, &CompileOptions::default())
        .unwrap_or_else(|e| panic!("running {:?} failed: {}", source, e))
}

#[test]
fn test_filter_on_related_field() {
    let results = run(r#"MODEL: project SELECT: (name, owner.login) WHERE: owner.company == "Acme""#);

    assert_eq!(
        results,
        [
            json!({"name": "cql", "owner": {"login": "alice"}}),
            json!({"name": "cql-fork-fork", "owner": {"login": "bob"}}),
            json!({"name": "widgets", "owner": {"login": "bob"}}),
        ]
    );
}

#[test]
fn test_self_reference_nests_two_levels() {
    let results = run("MODEL: project SELECT: (name, forked_from.name, forked_from.forked_from.name)");

    // Inner joins keep only projects two forks deep
    assert_eq!(
        results,
        [json!({
            "name": "cql-fork-fork",
            "forked_from": {
                "name": "cql-fork",
                "forked_from": {"name": "cql"}
            }
        })]
    );
}

#[test]
fn test_many_to_many_bridges_junction() {
    let results = run("MODEL: project SELECT: (name, members.login) ORDERBY: (name)");

    // One row per junction match, each carrying the full member list
    let cql = json!({"name": "cql", "members": [{"login": "alice"}, {"login": "bob"}]});
    let widgets = json!({"name": "widgets", "members": [{"login": "bob"}, {"login": "dave"}]});
    assert_eq!(results, [cql.clone(), cql, widgets.clone(), widgets]);
}

#[test]
fn test_aggregate_with_grouping() {
    let results = run("MODEL: commit SELECT: (SUM: comments.position) GROUPBY: (author.login)");

    // author.login only groups, so it never appears in the output
    assert_eq!(
        results,
        [
            json!({"comments": [{"position": 3}, {"position": 5}], "sum": 10}),
            json!({"comments": [{"position": 7}], "sum": 7}),
        ]
    );
}

#[test]
fn test_null_foreign_key_materializes_null() {
    let store = store();
    let catalog = store.catalog();
    let output = compile(
        "MODEL: project SELECT: (name, forked_from.name) ORDERBY: (id)",
        catalog,
        &CompileOptions::default(),
    )
    .unwrap();

    // Materialize root records directly, bypassing the inner join
    let all = compile("MODEL: project SELECT: (name) ORDERBY: (id)", catalog, &CompileOptions::default())
        .unwrap();
    let rows = (&store).execute(&all.spec).unwrap();
    let results = materialize_all(&rows, &output.tree);

    assert_eq!(results.len(), 5);
    assert_eq!(results[0], json!({"name": "cql", "forked_from": null}));
    assert_eq!(
        results[1],
        json!({"name": "cql-fork", "forked_from": {"name": "cql"}})
    );
}

#[test]
fn test_empty_to_many_relation_is_empty_list() {
    let store = store();
    let catalog = store.catalog();
    let output = compile("MODEL: commit SELECT: (sha, comments.body)", catalog, &CompileOptions::default())
        .unwrap();
    let all = compile("MODEL: commit SELECT: (sha)", catalog, &CompileOptions::default()).unwrap();

    let rows = (&store).execute(&all.spec).unwrap();
    let results = materialize_all(&rows, &output.tree);

    assert_eq!(results[3], json!({"sha": "d4aa70", "comments": []}));
}

#[test]
fn test_where_only_relation_is_absent() {
    let results = run("MODEL: issue SELECT: (reporter.login) WHERE: project.name == 'cql'");

    assert_eq!(
        results,
        [
            json!({"reporter": {"login": "bob"}}),
            json!({"reporter": {"login": "carol"}}),
        ]
    );
}

#[test]
fn test_order_and_compare() {
    let results = run("MODEL: comment SELECT: (body, author.login) ORDERBY: (position) WHERE: 4 > position");

    assert_eq!(
        results,
        [
            json!({"body": "typo", "author": {"login": "bob"}}),
            json!({"body": "nit: rename this", "author": {"login": "bob"}}),
        ]
    );
}

#[test]
fn test_null_never_matches_filters() {
    let results = run("MODEL: user SELECT: (login) WHERE: company != 'Acme'");
    assert_eq!(results, [json!({"login": "carol"})]);
}

#[test]
fn test_row_cap_applies() {
    let store = store();
    let options = CompileOptions::default().with_row_limit(2);
    let results = query("MODEL: user SELECT: (login)", store.catalog(), &&store, &options).unwrap();

    assert_eq!(results, [json!({"login": "alice"}), json!({"login": "bob"})]);
}
