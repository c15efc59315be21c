//! Schema catalog: read-only metadata about queryable entities.
//!
//! The catalog is built once, by explicit registration through
//! [`CatalogBuilder`] or from a TOML declaration, and is never mutated
//! afterwards. Query compilation only reads it.
//!
//! Each entity exposes plain fields and named relations. A relation is one
//! of three kinds:
//!
//! ```text
//! ForeignKey   project.owner     ──n:1──▶ user
//! ReverseOne   user.projects     ──1:n──▶ project      (project holds the key)
//! ReverseMany  project.members   ──n:m──▶ user         (through project_members)
//! ```

mod builder;
mod loader;
mod metadata;

pub use builder::{CatalogBuilder, EntityDef, ForeignKeyDef};
pub use metadata::{FieldMeta, ModelMeta, RelationMeta};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Errors raised while building a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Entity declared twice: {0}")]
    DuplicateEntity(String),

    #[error("Entity '{entity}' declares '{member}' more than once")]
    DuplicateMember { entity: String, member: String },

    #[error("Foreign key '{entity}.{field}' targets unknown model '{target}'")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("Junction '{entity}' must have exactly two foreign keys, found {found}")]
    InvalidJunction { entity: String, found: usize },

    #[error("Failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse schema declaration: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Storage type of a plain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    DateTime,
}

/// A plain (non-relation) field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Physical column name.
    pub column: String,
    pub field_type: FieldType,
    pub primary_key: bool,
    pub unique: bool,
}

/// How a relation connects its owner to the related entity.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    /// The owner holds `column`, referencing the target's primary key.
    ForeignKey { target: String, column: String },
    /// The target holds foreign key `foreign_key` (stored in `column`)
    /// referencing the owner's primary key.
    ReverseOne {
        target: String,
        foreign_key: String,
        column: String,
    },
    /// Many-to-many through a junction entity. `near_field` on the junction
    /// references the owner, `far_field` references the target.
    ReverseMany {
        junction: String,
        near_field: String,
        near_column: String,
        far_field: String,
        far_column: String,
        target: String,
    },
}

/// Multiplicity of a relation, as seen from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl Cardinality {
    /// The tag used by the metadata export.
    pub fn tag(self) -> &'static str {
        match self {
            Cardinality::ManyToOne => "n:1",
            Cardinality::OneToMany => "1:n",
            Cardinality::ManyToMany => "n:m",
        }
    }
}

impl RelationKind {
    /// The entity reached by following this relation.
    pub fn target(&self) -> &str {
        match self {
            RelationKind::ForeignKey { target, .. }
            | RelationKind::ReverseOne { target, .. }
            | RelationKind::ReverseMany { target, .. } => target,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            RelationKind::ForeignKey { .. } => Cardinality::ManyToOne,
            RelationKind::ReverseOne { .. } => Cardinality::OneToMany,
            RelationKind::ReverseMany { .. } => Cardinality::ManyToMany,
        }
    }
}

/// Whether an entity can be queried directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Model,
    /// A two-key association entity realizing a many-to-many relation.
    Junction,
}

/// A named member of an entity: either a plain field or a relation.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Field(&'a FieldDescriptor),
    Relation(&'a RelationKind),
}

/// Immutable description of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: String,
    /// Physical table name.
    pub table: String,
    pub kind: EntityKind,
    fields: Vec<FieldDescriptor>,
    relations: Vec<(String, RelationKind)>,
}

impl EntityDescriptor {
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// All relations, foreign keys first, in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationKind)> {
        self.relations.iter().map(|(name, kind)| (name.as_str(), kind))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationKind> {
        self.relations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| kind)
    }

    /// Foreign keys held by this entity: field name → target entity.
    pub fn outgoing(&self) -> impl Iterator<Item = (&str, &str)> {
        self.relations().filter_map(|(name, kind)| match kind {
            RelationKind::ForeignKey { target, .. } => Some((name, target.as_str())),
            _ => None,
        })
    }

    /// Relations whose key lives on another entity.
    pub fn incoming(&self) -> impl Iterator<Item = (&str, &RelationKind)> {
        self.relations()
            .filter(|(_, kind)| !matches!(kind, RelationKind::ForeignKey { .. }))
    }

    /// Look up a field or relation by name.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        self.field(name)
            .map(Member::Field)
            .or_else(|| self.relation(name).map(Member::Relation))
    }

    fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some()
    }
}

/// The set of all declared entities.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    entities: Vec<EntityDescriptor>,
    index: HashMap<String, usize>,
}

impl SchemaCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Look up any entity, junctions included.
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.index.get(name).map(|&i| &self.entities[i])
    }

    /// Look up an entity that may be used as a query root.
    pub fn model(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entity(name).filter(|e| e.kind == EntityKind::Model)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Names of the queryable models, in declaration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .filter(|e| e.kind == EntityKind::Model)
            .map(|e| e.name.as_str())
    }

    fn insert(&mut self, entity: EntityDescriptor) -> Result<(), CatalogError> {
        if self.index.contains_key(&entity.name) {
            return Err(CatalogError::DuplicateEntity(entity.name));
        }
        self.index.insert(entity.name.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    fn entity_mut(&mut self, name: &str) -> Option<&mut EntityDescriptor> {
        let index = *self.index.get(name)?;
        self.entities.get_mut(index)
    }
}
