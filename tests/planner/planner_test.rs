//! Planner tests: query trees, compiled specs and resolution errors.

use cql::catalog::{Cardinality, SchemaCatalog};
use cql::lang::{parse, AggregateFunction, Comparator, Literal, LogicalOperator};
use cql::planner::{
    ColumnRef, CompiledSpec, PlannerOptions, Predicate, PredicateValue, QueryPlanner,
    ResolutionFailure, Resolved, ROW_LIMIT,
};
use cql::tree::{Command, QueryTree};
use cql::CqlError;

fn github() -> SchemaCatalog {
    SchemaCatalog::from_toml_str(include_str!("../../demos/github.toml"))
        .expect("demo schema should load")
}

fn plan(source: &str) -> Result<(CompiledSpec, QueryTree), CqlError> {
    let catalog = github();
    let query = parse(source).expect("query should parse");
    QueryPlanner::new(&catalog).compile(&query)
}

fn plan_ok(source: &str) -> (CompiledSpec, QueryTree) {
    plan(source).unwrap_or_else(|e| panic!("planning {:?} failed: {}", source, e))
}

// ============================================================================
// Query tree
// ============================================================================

#[test]
fn test_filter_only_paths_are_not_selected() {
    let (_, tree) =
        plan_ok(r#"MODEL: project SELECT: (name, owner.login) WHERE: owner.company == "Acme""#);

    let root = tree.root();
    let owner = tree.get_child(root, "owner").expect("owner node");
    assert_eq!(tree.node(owner).entity, "user");
    assert_eq!(tree.node(owner).cardinality, Some(Cardinality::ManyToOne));
    assert!(tree.node(owner).commands.contains(Command::Select));
    assert!(tree.node(owner).commands.contains(Command::Where));

    let login = tree.get_field(owner, "login").unwrap();
    assert!(login.commands.contains(Command::Select));
    let company = tree.get_field(owner, "company").unwrap();
    assert!(company.commands.contains(Command::Where));
    assert!(!company.commands.contains(Command::Select));
}

#[test]
fn test_many_to_many_node_has_shadow_field() {
    let (_, tree) = plan_ok("MODEL: project SELECT: (name, members.login)");

    let members = tree.get_child(tree.root(), "members").expect("members node");
    let node = tree.node(members);
    assert_eq!(node.entity, "user");
    assert_eq!(node.shadow_field.as_deref(), Some("member"));
    assert_eq!(node.cardinality, Some(Cardinality::ManyToMany));
    assert!(node.is_collection());
}

#[test]
fn test_group_by_path_is_not_selected() {
    let (_, tree) = plan_ok("MODEL: commit SELECT: (SUM: comments.position) GROUPBY: (author.login)");

    let root = tree.root();
    let author = tree.get_child(root, "author").unwrap();
    assert!(tree.node(author).commands.contains(Command::GroupBy));
    assert!(!tree.node(author).commands.contains(Command::Select));

    let comments = tree.get_child(root, "comments").unwrap();
    assert!(tree.node(comments).commands.contains(Command::Select));
    assert_eq!(tree.node(comments).cardinality, Some(Cardinality::OneToMany));

    insta::assert_snapshot!(tree.to_string().trim_end(), @r"
    commit [SELECT|GROUPBY]
        comments -> comment [SELECT]
            position [SELECT]
        author -> user [GROUPBY]
            login [GROUPBY]
    ");
}

#[test]
fn test_repeated_paths_share_nodes() {
    // k relation hops build k + 1 nodes however often the path recurs
    let (spec, tree) = plan_ok(
        "MODEL: comment SELECT: (commit.author.login, commit.author.company) \
         GROUPBY: (commit.author.login) ORDERBY: (commit.author.login) \
         WHERE: commit.author.login == 'bob' OR commit.author.company != 'Acme'",
    );

    assert_eq!(tree.node_count(), 3);
    assert_eq!(tree.field_count(), 2);
    assert_eq!(spec.joins.len(), 2);

    let commit = tree.get_child(tree.root(), "commit").unwrap();
    let author = tree.get_child(commit, "author").unwrap();
    let login = tree.get_field(author, "login").unwrap();
    let tags: Vec<Command> = login.commands.iter().collect();
    assert_eq!(
        tags,
        [
            Command::Select,
            Command::GroupBy,
            Command::OrderBy,
            Command::Where
        ]
    );
}

#[test]
fn test_relation_terminal_in_where_uses_primary_key() {
    let (spec, tree) = plan_ok("MODEL: project SELECT: (name) WHERE: owner == 2");

    assert_eq!(tree.node_count(), 2);
    assert_eq!(
        spec.predicate,
        Some(Predicate::Compare {
            column: ColumnRef::new("user", "id"),
            op: Comparator::Eq,
            value: PredicateValue::Literal(Literal::Integer(2)),
        })
    );
}

// ============================================================================
// Compiled spec
// ============================================================================

#[test]
fn test_spec_projections_and_joins() {
    let (spec, _) =
        plan_ok(r#"MODEL: project SELECT: (name, owner.login) WHERE: owner.company == "Acme""#);

    assert_eq!(spec.model.entity, "project");
    assert_eq!(spec.model.table, "projects");
    assert_eq!(spec.joins.len(), 1);

    let join = &spec.joins[0];
    assert_eq!(join.left, "project");
    assert_eq!(join.right.entity, "user");
    assert!(join.right.alias.is_none());
    assert_eq!(join.on.left, ColumnRef::new("project", "owner_id"));
    assert_eq!(join.on.right, ColumnRef::new("user", "id"));

    let select: Vec<&Resolved> = spec.select.iter().map(|s| &s.expr).collect();
    assert_eq!(
        select,
        [
            &Resolved::Column(ColumnRef::new("project", "name")),
            &Resolved::Column(ColumnRef::new("user", "login")),
        ]
    );
}

#[test]
fn test_bare_relation_selects_whole_table() {
    let (spec, _) = plan_ok("MODEL: project SELECT: (owner)");

    assert_eq!(
        spec.select[0].expr,
        Resolved::Table {
            relation: "user".into()
        }
    );
}

#[test]
fn test_aggregate_alias() {
    let (spec, _) = plan_ok("MODEL: commit SELECT: (SUM: comments.position) GROUPBY: (author.login)");

    assert_eq!(spec.select.len(), 1);
    assert_eq!(spec.select[0].aggregate, Some(AggregateFunction::Sum));
    assert_eq!(spec.select[0].alias.as_deref(), Some("sum"));
    assert_eq!(
        spec.group_by,
        [Resolved::Column(ColumnRef::new("user", "login"))]
    );

    let aggregates: Vec<_> = spec.aggregates().map(|(f, _, alias)| (f, alias)).collect();
    assert_eq!(aggregates, [(AggregateFunction::Sum, "sum")]);
}

#[test]
fn test_distinct_aggregates_each_get_an_alias() {
    let (spec, _) = plan_ok("MODEL: commit SELECT: (COUNT: comments.id, MAX: comments.line)");

    let aliases: Vec<&str> = spec.aggregates().map(|(_, _, alias)| alias).collect();
    assert_eq!(aliases, ["count", "max"]);
}

#[test]
fn test_repeated_aggregate_is_rejected() {
    let err = plan("MODEL: commit SELECT: (SUM: comments.position, SUM: comments.line)").unwrap_err();

    assert!(matches!(
        err,
        CqlError::AggregationAliasCollision { ref alias, .. } if alias == "sum"
    ));
    assert!(err.is_client_error());
}

#[test]
fn test_literal_first_comparison_is_mirrored() {
    let (spec, _) = plan_ok("MODEL: comment SELECT: (body) WHERE: 5 < line");

    assert_eq!(
        spec.predicate,
        Some(Predicate::Compare {
            column: ColumnRef::new("comment", "line"),
            op: Comparator::Gt,
            value: PredicateValue::Literal(Literal::Integer(5)),
        })
    );
}

#[test]
fn test_field_to_field_comparison() {
    let (spec, _) = plan_ok("MODEL: commit SELECT: (sha) WHERE: author.login == committer.login");

    assert_eq!(spec.joins.len(), 2);
    assert_eq!(spec.joins[1].right.alias.as_deref(), Some("user_1"));
    assert_eq!(
        spec.predicate,
        Some(Predicate::Compare {
            column: ColumnRef::new("user", "login"),
            op: Comparator::Eq,
            value: PredicateValue::Column(ColumnRef::new("user_1", "login")),
        })
    );
}

#[test]
fn test_predicate_keeps_right_grouping() {
    let (spec, _) = plan_ok("MODEL: user SELECT: (login) WHERE: city == 'a' AND state == 'b' OR id > 3");

    match spec.predicate {
        Some(Predicate::Logical { left, op, right }) => {
            assert_eq!(op, LogicalOperator::And);
            assert!(matches!(*left, Predicate::Compare { .. }));
            assert!(matches!(
                *right,
                Predicate::Logical {
                    op: LogicalOperator::Or,
                    ..
                }
            ));
        }
        other => panic!("Expected logical predicate, got {:?}", other),
    }
}

#[test]
fn test_row_limit_is_capped() {
    let catalog = github();
    let query = parse("MODEL: user SELECT: (login)").unwrap();

    let (spec, _) = QueryPlanner::new(&catalog).compile(&query).unwrap();
    assert_eq!(spec.limit, ROW_LIMIT);

    let (spec, _) = QueryPlanner::new(&catalog)
        .with_options(PlannerOptions { row_limit: 50 })
        .compile(&query)
        .unwrap();
    assert_eq!(spec.limit, 50);

    let (spec, _) = QueryPlanner::new(&catalog)
        .with_options(PlannerOptions { row_limit: 1_000_000 })
        .compile(&query)
        .unwrap();
    assert_eq!(spec.limit, ROW_LIMIT);
}

// ============================================================================
// Resolution errors
// ============================================================================

#[test]
fn test_unknown_field() {
    let err = plan("MODEL: project SELECT: (nonexistent)").unwrap_err();

    match err {
        CqlError::Resolution(e) => {
            assert_eq!(e.segment, "nonexistent");
            assert_eq!(e.entity, "project");
            assert_eq!(e.failure, ResolutionFailure::UnknownMember);
            assert_eq!(e.to_string(), "Field nonexistent of model project does not exist");
        }
        other => panic!("Expected resolution error, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_deep_in_path() {
    let err = plan("MODEL: project SELECT: (name) WHERE: owner.salary > 10").unwrap_err();

    match err {
        CqlError::Resolution(e) => {
            assert_eq!(e.entity, "user");
            assert_eq!(e.segment, "salary");
        }
        other => panic!("Expected resolution error, got {:?}", other),
    }
}

#[test]
fn test_path_through_plain_field() {
    let err = plan("MODEL: project SELECT: (name.length)").unwrap_err();

    assert!(matches!(
        err,
        CqlError::Resolution(ref e) if e.failure == ResolutionFailure::NotARelation && e.segment == "name"
    ));
}

#[test]
fn test_unknown_model() {
    let err = plan("MODEL: organisation SELECT: (name)").unwrap_err();
    assert!(matches!(
        err,
        CqlError::Resolution(ref e) if e.failure == ResolutionFailure::UnknownModel
    ));
    assert_eq!(err.to_string(), "Model organisation does not exist");
}

#[test]
fn test_junction_is_not_a_model() {
    let err = plan("MODEL: project_members SELECT: (repo_id)").unwrap_err();
    assert!(matches!(
        err,
        CqlError::Resolution(ref e) if e.failure == ResolutionFailure::UnknownModel
    ));
}
