//! Alias allocation for entities bound more than once in one query.

use std::collections::HashSet;

use cql::catalog::SchemaCatalog;
use cql::lang::parse;
use cql::planner::{CompiledSpec, QueryPlanner};
use cql::tree::QueryTree;

fn github() -> SchemaCatalog {
    SchemaCatalog::from_toml_str(include_str!("../../demos/github.toml"))
        .expect("demo schema should load")
}

fn plan(source: &str) -> (CompiledSpec, QueryTree) {
    let catalog = github();
    let query = parse(source).expect("query should parse");
    QueryPlanner::new(&catalog)
        .compile(&query)
        .unwrap_or_else(|e| panic!("planning {:?} failed: {}", source, e))
}

fn bindings(spec: &CompiledSpec) -> Vec<&str> {
    std::iter::once(spec.model.binding())
        .chain(spec.joins.iter().map(|j| j.right.binding()))
        .collect()
}

#[test]
fn test_self_reference_gets_numbered_aliases() {
    let (spec, tree) =
        plan("MODEL: project SELECT: (name, forked_from.name, forked_from.forked_from.name)");

    assert_eq!(bindings(&spec), ["project", "project_1", "project_2"]);
    assert_eq!(spec.joins[0].on.left.relation, "project");
    assert_eq!(spec.joins[1].on.left.relation, "project_1");

    let second_fork = spec.table("project_2").expect("project_2 is bound");
    assert_eq!(second_fork.table, "projects");
    assert_eq!(second_fork.entity, "project");
    assert!(spec.table("project_3").is_none());

    let root = tree.root();
    let first = tree.get_child(root, "forked_from").unwrap();
    let second = tree.get_child(first, "forked_from").unwrap();
    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.node(root).binding(), "project");
    assert_eq!(tree.node(first).alias.as_deref(), Some("project_1"));
    assert_eq!(tree.node(second).alias.as_deref(), Some("project_2"));
    assert_eq!(tree.node(second).parent(), Some(first));
}

#[test]
fn test_alias_reused_across_clauses() {
    let (spec, tree) = plan(
        "MODEL: project SELECT: (forked_from.name) ORDERBY: (forked_from.name) \
         WHERE: forked_from.name != 'cql'",
    );

    assert_eq!(bindings(&spec), ["project", "project_1"]);
    assert_eq!(tree.node_count(), 2);
}

#[test]
fn test_sibling_relations_to_same_entity() {
    let (spec, _) = plan("MODEL: issue SELECT: (reporter.login, assignee.login, project.owner.login)");

    assert_eq!(bindings(&spec), ["issue", "user", "user_1", "project", "user_2"]);
}

#[test]
fn test_junction_to_same_entity() {
    let (spec, tree) = plan("MODEL: user SELECT: (login, follows.login, follower.login)");

    assert_eq!(
        bindings(&spec),
        ["user", "followers", "user_1", "followers_1", "user_2"]
    );

    let follows = tree.get_child(tree.root(), "follows").unwrap();
    assert_eq!(tree.node(follows).shadow_field.as_deref(), Some("user"));
    let follower = tree.get_child(tree.root(), "follower").unwrap();
    assert_eq!(tree.node(follower).shadow_field.as_deref(), Some("follower"));
}

#[test]
fn test_bindings_are_unique() {
    let (spec, _) = plan(
        "MODEL: commit SELECT: (author.login, committer.login, comments.author.login, \
         parents.author.login, children.committer.login, projects.owner.login)",
    );

    let all = bindings(&spec);
    let unique: HashSet<&str> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len(), "duplicate binding in {:?}", all);
}
