//! Explicit registration of entities into a [`SchemaCatalog`].
//!
//! Registration happens in two passes: first every entity is inserted with
//! its plain fields and foreign keys, then backrefs are attached to the
//! entities they point at. Declaration order therefore does not matter.

use inflector::Inflector;

use super::{
    CatalogError, EntityDescriptor, EntityKind, FieldDescriptor, FieldType, RelationKind,
    SchemaCatalog,
};

impl FieldDescriptor {
    /// A plain field stored in a column of the same name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            field_type,
            primary_key: false,
            unique: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark as primary key. Primary keys are always unique.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.unique = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A foreign key declared on an entity.
#[derive(Debug, Clone)]
pub struct ForeignKeyDef {
    pub name: String,
    pub target: String,
    pub column: Option<String>,
    pub backref: Option<String>,
}

impl ForeignKeyDef {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            column: None,
            backref: None,
        }
    }

    /// Physical column, defaults to `<name>_id`.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Name of the relation created on the target entity.
    pub fn backref(mut self, backref: impl Into<String>) -> Self {
        self.backref = Some(backref.into());
        self
    }

    fn resolved_column(&self) -> String {
        self.column
            .clone()
            .unwrap_or_else(|| format!("{}_id", self.name))
    }
}

/// Declaration of a single entity.
#[derive(Debug, Clone)]
pub struct EntityDef {
    name: String,
    table: Option<String>,
    kind: EntityKind,
    fields: Vec<FieldDescriptor>,
    foreign_keys: Vec<ForeignKeyDef>,
}

impl EntityDef {
    /// A queryable model. Gets an implicit `id` primary key unless one is declared.
    pub fn model(name: impl Into<String>) -> Self {
        Self::new(name.into(), EntityKind::Model)
    }

    /// A two-key association entity.
    pub fn junction(name: impl Into<String>) -> Self {
        Self::new(name.into(), EntityKind::Junction)
    }

    fn new(name: String, kind: EntityKind) -> Self {
        Self {
            name,
            table: None,
            kind,
            fields: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.with_field(FieldDescriptor::new(name, field_type))
    }

    pub fn unique_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.with_field(FieldDescriptor::new(name, field_type).unique())
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }
}

/// Collects entity declarations and validates them into a catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    defs: Vec<EntityDef>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, def: EntityDef) -> Self {
        self.defs.push(def);
        self
    }

    pub fn add(&mut self, def: EntityDef) -> &mut Self {
        self.defs.push(def);
        self
    }

    pub fn build(self) -> Result<SchemaCatalog, CatalogError> {
        let mut catalog = SchemaCatalog::default();
        let defs: Vec<EntityDef> = self.defs.into_iter().map(normalize).collect();

        // Pass 1: entities with their own fields and foreign keys
        for def in &defs {
            catalog.insert(describe(def)?)?;
        }

        for def in &defs {
            for fk in &def.foreign_keys {
                if catalog.model(&fk.target).is_none() {
                    return Err(CatalogError::UnknownTarget {
                        entity: def.name.clone(),
                        field: fk.name.clone(),
                        target: fk.target.clone(),
                    });
                }
            }
        }

        // Pass 2: backrefs
        for def in &defs {
            match def.kind {
                EntityKind::Model => attach_reverse_one(&mut catalog, def)?,
                EntityKind::Junction => attach_reverse_many(&mut catalog, def)?,
            }
        }

        tracing::debug!(
            entities = catalog.entities.len(),
            models = catalog.model_names().count(),
            "built schema catalog"
        );
        Ok(catalog)
    }
}

/// Entity and target names are snake_case; `ProjectMembers` becomes `project_members`.
fn normalize(mut def: EntityDef) -> EntityDef {
    def.name = def.name.to_snake_case();
    for fk in &mut def.foreign_keys {
        fk.target = fk.target.to_snake_case();
    }
    def
}

fn describe(def: &EntityDef) -> Result<EntityDescriptor, CatalogError> {
    let mut fields = def.fields.clone();
    if def.kind == EntityKind::Model && !fields.iter().any(|f| f.primary_key) {
        fields.insert(0, FieldDescriptor::new("id", FieldType::Integer).primary_key());
    }

    let relations = def
        .foreign_keys
        .iter()
        .map(|fk| {
            (
                fk.name.clone(),
                RelationKind::ForeignKey {
                    target: fk.target.clone(),
                    column: fk.resolved_column(),
                },
            )
        })
        .collect();

    let entity = EntityDescriptor {
        name: def.name.clone(),
        table: def.table.clone().unwrap_or_else(|| def.name.clone()),
        kind: def.kind,
        fields,
        relations,
    };

    let mut seen = std::collections::HashSet::new();
    let names = entity
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(entity.relations.iter().map(|(n, _)| n.as_str()));
    for name in names {
        if !seen.insert(name) {
            return Err(CatalogError::DuplicateMember {
                entity: entity.name.clone(),
                member: name.to_string(),
            });
        }
    }

    Ok(entity)
}

fn add_relation(
    catalog: &mut SchemaCatalog,
    owner: &str,
    name: &str,
    kind: RelationKind,
) -> Result<(), CatalogError> {
    let entity = catalog
        .entity_mut(owner)
        .ok_or_else(|| CatalogError::UnknownTarget {
            entity: owner.to_string(),
            field: name.to_string(),
            target: owner.to_string(),
        })?;
    if entity.has_member(name) {
        return Err(CatalogError::DuplicateMember {
            entity: owner.to_string(),
            member: name.to_string(),
        });
    }
    tracing::trace!(entity = owner, relation = name, "attached backref");
    entity.relations.push((name.to_string(), kind));
    Ok(())
}

fn attach_reverse_one(catalog: &mut SchemaCatalog, def: &EntityDef) -> Result<(), CatalogError> {
    for fk in &def.foreign_keys {
        if let Some(backref) = &fk.backref {
            let kind = RelationKind::ReverseOne {
                target: def.name.clone(),
                foreign_key: fk.name.clone(),
                column: fk.resolved_column(),
            };
            add_relation(catalog, &fk.target, backref, kind)?;
        }
    }
    Ok(())
}

fn attach_reverse_many(catalog: &mut SchemaCatalog, def: &EntityDef) -> Result<(), CatalogError> {
    let [first, second] = def.foreign_keys.as_slice() else {
        return Err(CatalogError::InvalidJunction {
            entity: def.name.clone(),
            found: def.foreign_keys.len(),
        });
    };

    for (near, far) in [(first, second), (second, first)] {
        if let Some(backref) = &near.backref {
            let kind = RelationKind::ReverseMany {
                junction: def.name.clone(),
                near_field: near.name.clone(),
                near_column: near.resolved_column(),
                far_field: far.name.clone(),
                far_column: far.resolved_column(),
                target: far.target.clone(),
            };
            add_relation(catalog, &near.target, backref, kind)?;
        }
    }
    Ok(())
}
