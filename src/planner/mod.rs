//! Query planner: resolves an AST against the schema catalog.
//!
//! Planning produces two outputs from one pass over the query:
//! - a [`CompiledSpec`] describing tables, joins, projections, grouping,
//!   ordering, the predicate and the row limit;
//! - a [`QueryTree`] mirroring every field path the query touched, tagged
//!   with the clauses that touched it.
//!
//! Clauses are resolved in a fixed order (select, group by, order by,
//! where), so joins and aliases are allocated in discovery order.

mod resolve;
pub mod spec;

pub use spec::{
    ColumnRef, CompiledSpec, Join, JoinCondition, Predicate, PredicateValue, Resolved,
    SelectExpr, TableRef,
};

use std::collections::HashSet;
use std::fmt;

use crate::catalog::SchemaCatalog;
use crate::error::CqlError;
use crate::lang::{Expression, Operand, Query, SelectItem};
use crate::tree::{Command, QueryTree};

use resolve::Resolver;

/// Hard cap on the rows any compiled query may return.
pub const ROW_LIMIT: usize = 1000;

/// Why a path segment failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// No queryable model has this name.
    UnknownModel,
    /// The entity has no field or relation of this name.
    UnknownMember,
    /// A plain field was followed by further segments.
    NotARelation,
    /// A relation needs a primary key the entity does not declare.
    NoPrimaryKey,
}

/// A field path, or the queried model, that the catalog cannot resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub entity: String,
    pub segment: String,
    pub failure: ResolutionFailure,
}

impl ResolutionError {
    pub fn new(entity: &str, segment: &str, failure: ResolutionFailure) -> Self {
        Self {
            entity: entity.to_string(),
            segment: segment.to_string(),
            failure,
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entity, segment) = (&self.entity, &self.segment);
        match self.failure {
            ResolutionFailure::UnknownModel => write!(f, "Model {} does not exist", segment),
            ResolutionFailure::UnknownMember => {
                write!(f, "Field {} of model {} does not exist", segment, entity)
            }
            ResolutionFailure::NotARelation => {
                write!(f, "Field {} of model {} has no children", segment, entity)
            }
            ResolutionFailure::NoPrimaryKey => {
                write!(f, "Relation {} needs a primary key on model {}", segment, entity)
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// Options controlling compilation.
#[derive(Debug, Clone, Copy)]
pub struct PlannerOptions {
    /// Row limit; values above [`ROW_LIMIT`] are clamped.
    pub row_limit: usize,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            row_limit: ROW_LIMIT,
        }
    }
}

/// Compiles queries against one catalog.
pub struct QueryPlanner<'a> {
    catalog: &'a SchemaCatalog,
    options: PlannerOptions,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self {
            catalog,
            options: PlannerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PlannerOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile a parsed query into an executable spec and its query tree.
    pub fn compile(&self, query: &Query) -> Result<(CompiledSpec, QueryTree), CqlError> {
        let model = self.catalog.model(&query.model).ok_or_else(|| {
            ResolutionError::new(&query.model, &query.model, ResolutionFailure::UnknownModel)
        })?;
        let mut resolver = Resolver::new(self.catalog, model);

        // Select
        let mut aggregates = HashSet::new();
        let mut select = Vec::with_capacity(query.select.len());
        for item in &query.select {
            let expr = match item {
                SelectItem::Field(path) => {
                    let terminal = resolver.resolve(path, Command::Select)?;
                    SelectExpr {
                        expr: resolver.projection(terminal)?,
                        aggregate: None,
                        alias: None,
                    }
                }
                SelectItem::Aggregation(agg) => {
                    let alias = agg.function.alias();
                    if !aggregates.insert(agg.function) {
                        return Err(CqlError::AggregationAliasCollision {
                            function: agg.function.keyword().to_string(),
                            alias: alias.to_string(),
                        });
                    }
                    let terminal = resolver.resolve(&agg.field, Command::Select)?;
                    SelectExpr {
                        expr: Resolved::Column(resolver.column(terminal)?),
                        aggregate: Some(agg.function),
                        alias: Some(alias.to_string()),
                    }
                }
            };
            select.push(expr);
        }

        // Group by / order by
        let mut group_by = Vec::new();
        for path in query.group_by.iter().flatten() {
            let terminal = resolver.resolve(path, Command::GroupBy)?;
            group_by.push(Resolved::Column(resolver.column(terminal)?));
        }
        let mut order_by = Vec::new();
        for path in query.order_by.iter().flatten() {
            let terminal = resolver.resolve(path, Command::OrderBy)?;
            order_by.push(Resolved::Column(resolver.column(terminal)?));
        }

        // Where
        let predicate = query
            .where_clause
            .as_ref()
            .map(|expr| compile_expression(&mut resolver, expr))
            .transpose()?;

        let model_ref = TableRef {
            entity: model.name.clone(),
            table: model.table.clone(),
            alias: None,
        };
        let spec = CompiledSpec {
            model: model_ref,
            joins: resolver.joins,
            select,
            group_by,
            order_by,
            predicate,
            limit: self.options.row_limit.min(ROW_LIMIT),
        };

        tracing::debug!(
            model = %spec.model.entity,
            joins = spec.joins.len(),
            nodes = resolver.tree.node_count(),
            limit = spec.limit,
            "compiled query"
        );
        Ok((spec, resolver.tree))
    }
}

fn resolve_operand(
    resolver: &mut Resolver<'_>,
    operand: &Operand,
) -> Result<PredicateValue, ResolutionError> {
    match operand {
        Operand::Literal(lit) => Ok(PredicateValue::Literal(lit.clone())),
        Operand::Field(path) => {
            let terminal = resolver.resolve(path, Command::Where)?;
            Ok(PredicateValue::Column(resolver.column(terminal)?))
        }
    }
}

/// Compile a `WHERE:` expression so every comparison reads `column <op> value`.
fn compile_expression(
    resolver: &mut Resolver<'_>,
    expr: &Expression,
) -> Result<Predicate, CqlError> {
    match expr {
        Expression::Comparison(cmp) => {
            let first = resolve_operand(resolver, &cmp.first)?;
            let second = resolve_operand(resolver, &cmp.second)?;
            let (column, op, value) = match (first, second) {
                (PredicateValue::Column(column), value) => (column, cmp.comparator, value),
                (literal, PredicateValue::Column(column)) => {
                    (column, cmp.comparator.mirrored(), literal)
                }
                (PredicateValue::Literal(_), PredicateValue::Literal(_)) => {
                    return Err(CqlError::LiteralComparison(expr.to_string()));
                }
            };
            Ok(Predicate::Compare { column, op, value })
        }
        Expression::Logical { left, op, right } => Ok(Predicate::Logical {
            left: Box::new(compile_expression(resolver, left)?),
            op: *op,
            right: Box::new(compile_expression(resolver, right)?),
        }),
    }
}
