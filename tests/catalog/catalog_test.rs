//! Catalog tests against the demo schema.

use cql::catalog::{
    Cardinality, CatalogError, EntityDef, EntityKind, FieldType, ForeignKeyDef, Member,
    RelationKind, SchemaCatalog,
};

fn github() -> SchemaCatalog {
    SchemaCatalog::from_toml_str(include_str!("../../demos/github.toml"))
        .expect("demo schema should load")
}

#[test]
fn test_demo_schema_entities() {
    let catalog = github();

    let models: Vec<&str> = catalog.model_names().collect();
    assert_eq!(models, ["user", "project", "commit", "comment", "issue"]);

    let junction = catalog.entity("project_members").expect("junction entity");
    assert_eq!(junction.kind, EntityKind::Junction);
    assert_eq!(junction.table, "project_members");
    assert!(junction.primary_key().is_none());
    assert!(catalog.model("project_members").is_none());
}

#[test]
fn test_implicit_primary_key() {
    let catalog = github();
    let user = catalog.entity("user").unwrap();

    let pk = user.primary_key().expect("implicit id");
    assert_eq!(pk.name, "id");
    assert_eq!(pk.field_type, FieldType::Integer);
    assert!(pk.unique);
    assert!(user.field("login").unwrap().unique);
    assert!(!user.field("company").unwrap().unique);
}

#[test]
fn test_foreign_key_columns() {
    let catalog = github();
    let project = catalog.entity("project").unwrap();

    assert_eq!(
        project.relation("owner"),
        Some(&RelationKind::ForeignKey {
            target: "user".into(),
            column: "owner_id".into(),
        })
    );
    assert_eq!(
        project.relation("forked_from"),
        Some(&RelationKind::ForeignKey {
            target: "project".into(),
            column: "forked_from".into(),
        })
    );
}

#[test]
fn test_backrefs_become_reverse_relations() {
    let catalog = github();
    let commit = catalog.entity("commit").unwrap();

    assert_eq!(
        commit.relation("comments"),
        Some(&RelationKind::ReverseOne {
            target: "comment".into(),
            foreign_key: "commit".into(),
            column: "commit_id".into(),
        })
    );
    assert_eq!(
        commit.relation("comments").map(RelationKind::cardinality),
        Some(Cardinality::OneToMany)
    );
}

#[test]
fn test_junction_relations_both_directions() {
    let catalog = github();

    let members = catalog.entity("project").unwrap().relation("members");
    assert_eq!(
        members,
        Some(&RelationKind::ReverseMany {
            junction: "project_members".into(),
            near_field: "project".into(),
            near_column: "repo_id".into(),
            far_field: "member".into(),
            far_column: "user_id".into(),
            target: "user".into(),
        })
    );

    let member_projects = catalog.entity("user").unwrap().relation("member_projects");
    match member_projects {
        Some(RelationKind::ReverseMany {
            near_column,
            far_field,
            target,
            ..
        }) => {
            assert_eq!(near_column, "user_id");
            assert_eq!(far_field, "project");
            assert_eq!(target, "project");
        }
        other => panic!("Expected many-to-many relation, got {:?}", other),
    }
}

#[test]
fn test_self_referencing_junction() {
    let catalog = github();
    let user = catalog.entity("user").unwrap();

    for name in ["follows", "follower"] {
        let kind = user.relation(name).expect(name);
        assert_eq!(kind.target(), "user");
        assert_eq!(kind.cardinality(), Cardinality::ManyToMany);
    }
}

#[test]
fn test_member_lookup() {
    let catalog = github();
    let comment = catalog.entity("comment").unwrap();

    assert!(matches!(comment.member("body"), Some(Member::Field(_))));
    assert!(matches!(comment.member("author"), Some(Member::Relation(_))));
    assert!(comment.member("author_id").is_none());
}

#[test]
fn test_metadata_excludes_junctions() {
    let catalog = github();
    let metadata = catalog.metadata();

    let names: Vec<&str> = metadata.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["user", "project", "commit", "comment", "issue"]);

    let project = &metadata[1];
    let members = project
        .relations
        .iter()
        .find(|r| r.name == "members")
        .expect("members relation");
    assert_eq!(members.cardinality, "n:m");
    assert_eq!(members.rel_model, "user");

    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json[1]["model"], "project");
    assert!(json[1].get("name").is_none());
    assert_eq!(
        json[1]["relations"]
            .as_array()
            .and_then(|r| r.iter().find(|r| r["name"] == "members")),
        Some(&serde_json::json!({"name": "members", "type": "n:m", "rel_model": "user"}))
    );
}

#[test]
fn test_unknown_target_is_rejected() {
    let result = SchemaCatalog::builder()
        .entity(
            EntityDef::model("project").foreign_key(ForeignKeyDef::new("owner", "organisation")),
        )
        .build();

    assert!(matches!(
        result,
        Err(CatalogError::UnknownTarget { ref target, .. }) if target == "organisation"
    ));
}

#[test]
fn test_junction_needs_two_foreign_keys() {
    let result = SchemaCatalog::from_toml_str(
        r#"
[[model]]
name = "User"

[[junction]]
name = "Team"
foreign_keys = [{ name = "lead", target = "User" }]
"#,
    );

    assert!(matches!(
        result,
        Err(CatalogError::InvalidJunction { ref entity, found: 1 }) if entity == "team"
    ));
}

#[test]
fn test_backref_clashing_with_field() {
    let result = SchemaCatalog::from_toml_str(
        r#"
[[model]]
name = "User"
fields = [{ name = "projects", type = "integer" }]

[[model]]
name = "Project"
foreign_keys = [{ name = "owner", target = "User", backref = "projects" }]
"#,
    );

    assert!(matches!(
        result,
        Err(CatalogError::DuplicateMember { ref member, .. }) if member == "projects"
    ));
}

#[test]
fn test_malformed_declaration() {
    let result = SchemaCatalog::from_toml_str("[[model]]\nfields = 3\n");
    assert!(matches!(result, Err(CatalogError::ParseError(_))));
}
