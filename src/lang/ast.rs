//! AST node types for CQL.
//!
//! Every node implements `Display`, which re-serializes it as canonical CQL.
//! Parsing the rendered text yields an equal AST.

use std::fmt;

// ============================================================================
// Query (Root)
// ============================================================================

/// A complete CQL query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The queried model.
    pub model: String,
    /// Select items, in source order.
    pub select: Vec<SelectItem>,
    /// `GROUPBY:` paths, if the clause is present.
    pub group_by: Option<Vec<FieldPath>>,
    /// `ORDERBY:` paths, if the clause is present.
    pub order_by: Option<Vec<FieldPath>>,
    /// `WHERE:` expression, if the clause is present.
    pub where_clause: Option<Expression>,
}

// ============================================================================
// Field Paths
// ============================================================================

/// A dotted path such as `owner.login`.
///
/// Earlier segments are relation hops; the last segment names the terminal
/// field or relation. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        debug_assert!(!segments.is_empty(), "field path must have a segment");
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of relation hops before the terminal segment.
    pub fn hops(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::new(dotted.split('.'))
    }
}

// ============================================================================
// Select Items
// ============================================================================

/// Aggregate functions available in `SELECT:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunction {
    /// The output column alias for this aggregate.
    pub fn alias(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// An aggregate applied to a field path, e.g. `SUM: comments.position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub field: FieldPath,
}

/// One entry of the `SELECT:` list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Field(FieldPath),
    Aggregation(Aggregation),
}

impl SelectItem {
    pub fn field(&self) -> &FieldPath {
        match self {
            SelectItem::Field(path) => path,
            SelectItem::Aggregation(agg) => &agg.field,
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A literal value in a comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    String(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Comparator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ne => "!=",
        }
    }

    /// The comparator with its operands swapped: `a < b` is `b > a`.
    pub fn mirrored(self) -> Self {
        match self {
            Comparator::Ge => Comparator::Le,
            Comparator::Le => Comparator::Ge,
            Comparator::Gt => Comparator::Lt,
            Comparator::Lt => Comparator::Gt,
            other => other,
        }
    }
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Xor,
}

impl LogicalOperator {
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
            LogicalOperator::Xor => "XOR",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldPath),
    Literal(Literal),
}

/// `first <comparator> second`, with at least one side a field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub first: Operand,
    pub comparator: Comparator,
    pub second: Operand,
}

/// A `WHERE:` expression tree.
///
/// Logical chains group to the right: `a AND b OR c` is `a AND (b OR c)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Comparison(Comparison),
    Logical {
        left: Box<Expression>,
        op: LogicalOperator,
        right: Box<Expression>,
    },
}

impl Expression {
    /// All field paths referenced by this expression, left to right.
    pub fn field_paths(&self) -> Vec<&FieldPath> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a FieldPath>) {
        match self {
            Expression::Comparison(cmp) => {
                for operand in [&cmp.first, &cmp.second] {
                    if let Operand::Field(path) = operand {
                        out.push(path);
                    }
                }
            }
            Expression::Logical { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
        }
    }
}

// ============================================================================
// Display (canonical CQL)
// ============================================================================

fn write_path_list(f: &mut fmt::Formatter<'_>, paths: &[FieldPath]) -> fmt::Result {
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", path)?;
    }
    Ok(())
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(path) => write!(f, "{}", path),
            Operand::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Comparison(cmp) => write!(
                f,
                "{} {} {}",
                cmp.first,
                cmp.comparator.symbol(),
                cmp.second
            ),
            Expression::Logical { left, op, right } => {
                // The right side groups implicitly; a logical left side needs parentheses.
                match left.as_ref() {
                    Expression::Logical { .. } => write!(f, "({})", left)?,
                    Expression::Comparison(_) => write!(f, "{}", left)?,
                }
                write!(f, " {} {}", op.keyword(), right)
            }
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Field(path) => write!(f, "{}", path),
            SelectItem::Aggregation(agg) => {
                write!(f, "{}: {}", agg.function.keyword(), agg.field)
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MODEL: {} SELECT: (", self.model)?;
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, ")")?;
        if let Some(group_by) = &self.group_by {
            write!(f, " GROUPBY: (")?;
            write_path_list(f, group_by)?;
            write!(f, ")")?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " ORDERBY: (")?;
            write_path_list(f, order_by)?;
            write!(f, ")")?;
        }
        if let Some(expr) = &self.where_clause {
            write!(f, " WHERE: {}", expr)?;
        }
        Ok(())
    }
}
