//! Field-path resolution: grows the query tree and the join plan.

use std::collections::{HashMap, HashSet};

use crate::catalog::{Cardinality, EntityDescriptor, Member, RelationKind, SchemaCatalog};
use crate::lang::FieldPath;
use crate::tree::{Command, NodeId, QueryTree, TreeNode};

use super::spec::{ColumnRef, Join, JoinCondition, Resolved, TableRef};
use super::{ResolutionError, ResolutionFailure};

/// The end of a resolved path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Terminal {
    /// A plain field: binding and column.
    Field(ColumnRef),
    /// A relation, resolving to the node it reached.
    Relation(NodeId),
}

/// Mutable state of one planning pass.
pub(crate) struct Resolver<'a> {
    catalog: &'a SchemaCatalog,
    pub(crate) tree: QueryTree,
    pub(crate) joins: Vec<Join>,
    /// Entities already joined under their own name.
    used: HashSet<String>,
    /// Aliases handed out so far, per entity.
    alias_counts: HashMap<String, usize>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(catalog: &'a SchemaCatalog, model: &EntityDescriptor) -> Self {
        let mut used = HashSet::new();
        used.insert(model.name.clone());
        Self {
            catalog,
            tree: QueryTree::new(model.name.clone()),
            joins: Vec::new(),
            used,
            alias_counts: HashMap::new(),
        }
    }

    /// Walk `path` from the root, creating nodes and joins as needed and
    /// tagging every node along the way with `command`.
    pub(crate) fn resolve(
        &mut self,
        path: &FieldPath,
        command: Command,
    ) -> Result<Terminal, ResolutionError> {
        let mut current = self.tree.root();
        self.tree.node_mut(current).commands.insert(command);

        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            let entity = self.entity(current)?;
            tracing::trace!(entity = %entity.name, segment = %segment, "resolving segment");

            match entity.member(segment) {
                None => {
                    return Err(ResolutionError::new(
                        &entity.name,
                        segment,
                        ResolutionFailure::UnknownMember,
                    ))
                }
                Some(Member::Field(field)) => {
                    if !is_last {
                        return Err(ResolutionError::new(
                            &entity.name,
                            segment,
                            ResolutionFailure::NotARelation,
                        ));
                    }
                    if self.tree.get_field(current, segment).is_none() {
                        self.tree.add_field(current, segment.clone());
                    }
                    if let Some(field_node) = self.tree.get_field_mut(current, segment) {
                        field_node.commands.insert(command);
                    }
                    let binding = self.tree.node(current).binding().to_string();
                    return Ok(Terminal::Field(ColumnRef::new(binding, &field.column)));
                }
                Some(Member::Relation(kind)) => {
                    current = match self.tree.get_child(current, segment) {
                        Some(child) => child,
                        None => self.join(current, segment, kind)?,
                    };
                    self.tree.node_mut(current).commands.insert(command);
                }
            }
        }
        Ok(Terminal::Relation(current))
    }

    /// The column a terminal stands for. A relation stands for the
    /// primary key of the entity it reached.
    pub(crate) fn column(&self, terminal: Terminal) -> Result<ColumnRef, ResolutionError> {
        match terminal {
            Terminal::Field(column) => Ok(column),
            Terminal::Relation(id) => {
                let node = self.tree.node(id);
                let pk = primary_key(self.entity(id)?, &node.name)?;
                Ok(ColumnRef::new(node.binding(), pk))
            }
        }
    }

    /// What a bare `SELECT:` path projects: a column, or a whole table for
    /// a relation.
    pub(crate) fn projection(&self, terminal: Terminal) -> Result<Resolved, ResolutionError> {
        match terminal {
            Terminal::Relation(id) => Ok(Resolved::Table {
                relation: self.tree.node(id).binding().to_string(),
            }),
            field => Ok(Resolved::Column(self.column(field)?)),
        }
    }

    fn entity(&self, id: NodeId) -> Result<&'a EntityDescriptor, ResolutionError> {
        let name = &self.tree.node(id).entity;
        self.catalog
            .entity(name)
            .ok_or_else(|| ResolutionError::new(name, name, ResolutionFailure::UnknownModel))
    }

    fn lookup(&self, name: &str) -> Result<&'a EntityDescriptor, ResolutionError> {
        self.catalog
            .entity(name)
            .ok_or_else(|| ResolutionError::new(name, name, ResolutionFailure::UnknownModel))
    }

    /// Bind `entity` for a new join, aliasing it if it is already in use.
    fn bind(&mut self, entity: &EntityDescriptor) -> TableRef {
        let alias = if self.used.insert(entity.name.clone()) {
            None
        } else {
            let count = self.alias_counts.entry(entity.name.clone()).or_insert(0);
            *count += 1;
            let alias = format!("{}_{}", entity.name, count);
            tracing::debug!(entity = %entity.name, alias = %alias, "allocated alias");
            Some(alias)
        };
        TableRef {
            entity: entity.name.clone(),
            table: entity.table.clone(),
            alias,
        }
    }

    fn push_join(&mut self, left: &str, right: TableRef, left_col: &str, right_col: &str) {
        let on = JoinCondition {
            left: ColumnRef::new(left, left_col),
            right: ColumnRef::new(right.binding(), right_col),
        };
        tracing::debug!(
            left = %left,
            right = %right.binding(),
            on = %format!("{}.{} = {}.{}", on.left.relation, on.left.column, on.right.relation, on.right.column),
            "emitted join"
        );
        self.joins.push(Join {
            left: left.to_string(),
            right,
            on,
        });
    }

    /// Join the entity reached through `segment` and attach its node.
    fn join(
        &mut self,
        parent: NodeId,
        segment: &str,
        kind: &RelationKind,
    ) -> Result<NodeId, ResolutionError> {
        let parent_entity = self.entity(parent)?;
        let parent_binding = self.tree.node(parent).binding().to_string();

        let node = match kind {
            RelationKind::ForeignKey { target, column } => {
                let target = self.lookup(target)?;
                let target_pk = primary_key(target, segment)?;
                let right = self.bind(target);
                let alias = right.alias.clone();
                self.push_join(&parent_binding, right, column, target_pk);
                TreeNode::new(segment, &target.name)
                    .with_alias(alias)
                    .with_cardinality(Cardinality::ManyToOne)
            }
            RelationKind::ReverseOne { target, column, .. } => {
                let parent_pk = primary_key(parent_entity, segment)?;
                let target = self.lookup(target)?;
                let right = self.bind(target);
                let alias = right.alias.clone();
                self.push_join(&parent_binding, right, parent_pk, column);
                TreeNode::new(segment, &target.name)
                    .with_alias(alias)
                    .with_cardinality(Cardinality::OneToMany)
            }
            RelationKind::ReverseMany {
                junction,
                near_column,
                far_field,
                far_column,
                target,
                ..
            } => {
                let parent_pk = primary_key(parent_entity, segment)?;
                let junction = self.lookup(junction)?;
                let target = self.lookup(target)?;
                let target_pk = primary_key(target, segment)?;

                let through = self.bind(junction);
                let through_binding = through.binding().to_string();
                self.push_join(&parent_binding, through, parent_pk, near_column);

                let right = self.bind(target);
                let alias = right.alias.clone();
                self.push_join(&through_binding, right, far_column, target_pk);

                TreeNode::new(segment, &target.name)
                    .with_alias(alias)
                    .with_cardinality(Cardinality::ManyToMany)
                    .with_shadow_field(far_field.clone())
            }
        };

        Ok(self.tree.add_child(parent, node))
    }
}

fn primary_key<'e>(
    entity: &'e EntityDescriptor,
    segment: &str,
) -> Result<&'e str, ResolutionError> {
    entity
        .primary_key()
        .map(|pk| pk.column.as_str())
        .ok_or_else(|| ResolutionError::new(&entity.name, segment, ResolutionFailure::NoPrimaryKey))
}
