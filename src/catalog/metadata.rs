//! Serializable description of the queryable models.

use serde::Serialize;

use super::{FieldType, SchemaCatalog};

/// One model as exposed by the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMeta {
    #[serde(rename = "model")]
    pub name: String,
    pub fields: Vec<FieldMeta>,
    pub relations: Vec<RelationMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationMeta {
    pub name: String,
    /// `n:1`, `1:n` or `n:m`.
    #[serde(rename = "type")]
    pub cardinality: &'static str,
    pub rel_model: String,
}

impl SchemaCatalog {
    /// Describe every model, junctions excluded.
    ///
    /// Foreign keys are listed as `n:1` relations, not as fields.
    pub fn metadata(&self) -> Vec<ModelMeta> {
        self.entities()
            .filter(|e| self.model(&e.name).is_some())
            .map(|entity| ModelMeta {
                name: entity.name.clone(),
                fields: entity
                    .fields()
                    .iter()
                    .map(|f| FieldMeta {
                        name: f.name.clone(),
                        field_type: f.field_type,
                        primary_key: f.primary_key,
                        unique: f.unique,
                    })
                    .collect(),
                relations: entity
                    .relations()
                    .map(|(name, kind)| RelationMeta {
                        name: name.to_string(),
                        cardinality: kind.cardinality().tag(),
                        rel_model: kind.target().to_string(),
                    })
                    .collect(),
            })
            .collect()
    }
}
