//! SQL rendering of compiled specs.

use cql::catalog::SchemaCatalog;
use cql::compile::{compile, CompileOptions};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

fn github() -> SchemaCatalog {
    SchemaCatalog::from_toml_str(include_str!("../../demos/github.toml"))
        .expect("demo schema should load")
}

fn sql(source: &str) -> String {
    let output = compile(source, &github(), &CompileOptions::default())
        .unwrap_or_else(|e| panic!("compiling {:?} failed: {}", source, e));
    assert_valid_sql(&output.sql);
    output.sql
}

/// The rendered statement must be accepted by a real SQL parser.
fn assert_valid_sql(sql: &str) {
    if let Err(e) = Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        panic!("invalid SQL: {}\n{}", e, sql);
    }
}

#[test]
fn test_render_filtered_join() {
    insta::assert_snapshot!(
        sql(r#"MODEL: project SELECT: (name, owner.login) WHERE: owner.company == "Acme""#),
        @r#"
    SELECT "project"."name", "user"."login"
    FROM "projects" AS "project"
    INNER JOIN "users" AS "user" ON "project"."owner_id" = "user"."id"
    WHERE "user"."company" = 'Acme'
    LIMIT 1000
    "#
    );
}

#[test]
fn test_render_self_join() {
    insta::assert_snapshot!(
        sql("MODEL: project SELECT: (name, forked_from.name, forked_from.forked_from.name)"),
        @r#"
    SELECT "project"."name", "project_1"."name", "project_2"."name"
    FROM "projects" AS "project"
    INNER JOIN "projects" AS "project_1" ON "project"."forked_from" = "project_1"."id"
    INNER JOIN "projects" AS "project_2" ON "project_1"."forked_from" = "project_2"."id"
    LIMIT 1000
    "#
    );
}

#[test]
fn test_render_junction_join() {
    insta::assert_snapshot!(
        sql("MODEL: project SELECT: (name, members.login)"),
        @r#"
    SELECT "project"."name", "user"."login"
    FROM "projects" AS "project"
    INNER JOIN "project_members" ON "project"."id" = "project_members"."repo_id"
    INNER JOIN "users" AS "user" ON "project_members"."user_id" = "user"."id"
    LIMIT 1000
    "#
    );
}

#[test]
fn test_render_aggregate_with_grouping() {
    insta::assert_snapshot!(
        sql("MODEL: commit SELECT: (SUM: comments.position) GROUPBY: (author.login)"),
        @r#"
    SELECT SUM("comment"."position") AS "sum"
    FROM "commits" AS "commit"
    INNER JOIN "commit_comments" AS "comment" ON "commit"."id" = "comment"."commit_id"
    INNER JOIN "users" AS "user" ON "commit"."author_id" = "user"."id"
    GROUP BY "user"."login"
    LIMIT 1000
    "#
    );
}

#[test]
fn test_render_nested_logic() {
    insta::assert_snapshot!(
        sql("MODEL: user SELECT: (login) ORDERBY: (created_at) \
             WHERE: (city == 'Seattle' OR state == 'NY') AND 3 <= id XOR company != \"O'Brien\""),
        @r#"
    SELECT "user"."login"
    FROM "users" AS "user"
    WHERE ("user"."city" = 'Seattle' OR "user"."state" = 'NY') AND (("user"."id" >= 3) <> ("user"."company" <> 'O''Brien'))
    ORDER BY "user"."created_at"
    LIMIT 1000
    "#
    );
}

#[test]
fn test_render_whole_table() {
    insta::assert_snapshot!(
        sql("MODEL: comment SELECT: (body, author)"),
        @r#"
    SELECT "comment"."body", "user".*
    FROM "commit_comments" AS "comment"
    INNER JOIN "users" AS "user" ON "comment"."user_id" = "user"."id"
    LIMIT 1000
    "#
    );
}

#[test]
fn test_row_limit_option_renders() {
    let output = compile(
        "MODEL: user SELECT: (login)",
        &github(),
        &CompileOptions::default().with_row_limit(25),
    )
    .unwrap();

    assert!(output.sql.ends_with("LIMIT 25"));
    assert_valid_sql(&output.sql);
}

#[test]
fn test_table_alias_only_when_needed() {
    let catalog = SchemaCatalog::from_toml_str(
        r#"
[[model]]
name = "user"
fields = [{ name = "login", type = "text" }]
"#,
    )
    .unwrap();

    let output = compile("MODEL: user SELECT: (login)", &catalog, &CompileOptions::default())
        .unwrap();
    assert!(output.sql.contains("FROM \"user\"\n"), "{}", output.sql);
}
