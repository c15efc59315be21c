//! TOML schema declarations.
//!
//! ```toml
//! [[model]]
//! name = "User"
//! table = "users"
//! fields = [
//!     { name = "login", type = "text", unique = true },
//!     { name = "company", type = "text" },
//! ]
//!
//! [[model]]
//! name = "Project"
//! fields = [{ name = "name", type = "text" }]
//! foreign_keys = [{ name = "owner", target = "User", backref = "projects" }]
//!
//! [[junction]]
//! name = "ProjectMembers"
//! foreign_keys = [
//!     { name = "project", target = "Project", column = "repo_id", backref = "members" },
//!     { name = "member", target = "User", column = "user_id", backref = "member_projects" },
//! ]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{
    CatalogBuilder, CatalogError, EntityDef, FieldDescriptor, FieldType, ForeignKeyDef,
    SchemaCatalog,
};

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default, rename = "model")]
    models: Vec<EntityDecl>,

    #[serde(default, rename = "junction")]
    junctions: Vec<EntityDecl>,
}

#[derive(Debug, Deserialize)]
struct EntityDecl {
    name: String,
    table: Option<String>,
    #[serde(default)]
    fields: Vec<FieldDecl>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyDecl>,
}

#[derive(Debug, Deserialize)]
struct FieldDecl {
    name: String,
    #[serde(rename = "type")]
    field_type: FieldType,
    column: Option<String>,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Deserialize)]
struct ForeignKeyDecl {
    name: String,
    target: String,
    column: Option<String>,
    backref: Option<String>,
}

impl EntityDecl {
    fn into_def(self, mut def: EntityDef) -> EntityDef {
        if let Some(table) = self.table {
            def = def.table(table);
        }
        for field in self.fields {
            let mut descriptor = FieldDescriptor::new(field.name, field.field_type);
            if let Some(column) = field.column {
                descriptor = descriptor.column(column);
            }
            if field.primary_key {
                descriptor = descriptor.primary_key();
            }
            if field.unique {
                descriptor = descriptor.unique();
            }
            def = def.with_field(descriptor);
        }
        for fk in self.foreign_keys {
            let mut decl = ForeignKeyDef::new(fk.name, fk.target);
            decl.column = fk.column;
            decl.backref = fk.backref;
            def = def.foreign_key(decl);
        }
        def
    }
}

impl SchemaCatalog {
    /// Build a catalog from a TOML declaration.
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: SchemaFile = toml::from_str(source)?;

        let mut builder = CatalogBuilder::new();
        for decl in file.models {
            let def = EntityDef::model(decl.name.clone());
            builder.add(decl.into_def(def));
        }
        for decl in file.junctions {
            let def = EntityDef::junction(decl.name.clone());
            builder.add(decl.into_def(def));
        }
        builder.build()
    }

    /// Read and build a catalog from a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading schema declaration");
        Self::from_toml_str(&content)
    }
}
