//! The compiled query specification handed to an executor.

use serde::Serialize;

use crate::lang::{AggregateFunction, Comparator, Literal, LogicalOperator};

/// A table as bound in the compiled query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub entity: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableRef {
    /// The name columns of this table are qualified with.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.entity)
    }
}

/// A column of a bound table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    /// Binding of the owning table.
    pub relation: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            column: column.into(),
        }
    }
}

/// Equality between a column already in scope and one of the joined table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinCondition {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// An inner join of `right` onto the binding `left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub left: String,
    pub right: TableRef,
    pub on: JoinCondition,
}

/// What a field path resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolved {
    Column(ColumnRef),
    /// Every column of a bound table, for a bare relation in `SELECT:`.
    Table { relation: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectExpr {
    pub expr: Resolved,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Right-hand side of a compiled comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredicateValue {
    Literal(Literal),
    Column(ColumnRef),
}

/// A compiled `WHERE:` tree. Comparisons always read `column <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: Comparator,
        value: PredicateValue,
    },
    Logical {
        left: Box<Predicate>,
        op: LogicalOperator,
        right: Box<Predicate>,
    },
}

/// Everything an executor needs to run one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSpec {
    pub model: TableRef,
    pub joins: Vec<Join>,
    pub select: Vec<SelectExpr>,
    pub group_by: Vec<Resolved>,
    pub order_by: Vec<Resolved>,
    pub predicate: Option<Predicate>,
    pub limit: usize,
}

impl CompiledSpec {
    /// Select expressions carrying an aggregate, with their output alias.
    pub fn aggregates(&self) -> impl Iterator<Item = (AggregateFunction, &Resolved, &str)> {
        self.select.iter().filter_map(|s| {
            let function = s.aggregate?;
            let alias = s.alias.as_deref().unwrap_or(function.alias());
            Some((function, &s.expr, alias))
        })
    }

    /// Look up a bound table by binding name.
    pub fn table(&self, binding: &str) -> Option<&TableRef> {
        std::iter::once(&self.model)
            .chain(self.joins.iter().map(|j| &j.right))
            .find(|t| t.binding() == binding)
    }
}
