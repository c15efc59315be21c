//! End-to-end pipeline from CQL text to SQL or nested results.
//!
//! ```text
//! CQL text → Parse → AST → Plan (+ catalog) → {CompiledSpec, QueryTree}
//!                                   │
//!                     Execute → rows → Materialize → JSON
//! ```
//!
//! # Example
//!
//! ```
//! use cql::catalog::{EntityDef, FieldType, ForeignKeyDef, SchemaCatalog};
//! use cql::compile::{compile, CompileOptions};
//!
//! let catalog = SchemaCatalog::builder()
//!     .entity(EntityDef::model("user").field("login", FieldType::Text))
//!     .entity(
//!         EntityDef::model("project")
//!             .field("name", FieldType::Text)
//!             .foreign_key(ForeignKeyDef::new("owner", "user")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let output = compile(
//!     "MODEL: project SELECT: (name, owner.login)",
//!     &catalog,
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(output.spec.joins.len(), 1);
//! assert!(output.sql.contains("INNER JOIN"));
//! ```

use serde_json::Value;

use crate::catalog::SchemaCatalog;
use crate::error::CqlResult;
use crate::exec::{Executor, Row};
use crate::lang::{self, Query};
use crate::materialize::materialize;
use crate::planner::{CompiledSpec, PlannerOptions, QueryPlanner};
use crate::tree::QueryTree;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub planner: PlannerOptions,
}

impl CompileOptions {
    /// Lower the row limit. Values above the hard cap are clamped.
    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.planner.row_limit = row_limit;
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result of compiling one query.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The parsed query.
    pub query: Query,

    /// The plan handed to an executor.
    pub spec: CompiledSpec,

    /// Paths touched by the query, for materialization.
    pub tree: QueryTree,

    /// The plan rendered as SQL.
    pub sql: String,
}

// ============================================================================
// Pipeline Functions
// ============================================================================

/// Parse and plan `source` against `catalog`.
pub fn compile(
    source: &str,
    catalog: &SchemaCatalog,
    options: &CompileOptions,
) -> CqlResult<CompileOutput> {
    let query = lang::parse(source)?;
    let (spec, tree) = QueryPlanner::new(catalog)
        .with_options(options.planner)
        .compile(&query)?;
    let sql = spec.to_sql();

    Ok(CompileOutput {
        query,
        spec,
        tree,
        sql,
    })
}

/// Compile, execute and materialize `source`.
///
/// Each result object holds the selected paths, plus one entry per
/// aggregate under its alias.
pub fn query<E: Executor>(
    source: &str,
    catalog: &SchemaCatalog,
    executor: &E,
    options: &CompileOptions,
) -> CqlResult<Vec<Value>> {
    let output = compile(source, catalog, options)?;
    let rows = executor.execute(&output.spec)?;
    tracing::debug!(rows = rows.len(), "materializing results");

    Ok(rows
        .iter()
        .map(|row| result_object(row, &output.spec, &output.tree))
        .collect())
}

fn result_object<R: Row>(row: &R, spec: &CompiledSpec, tree: &QueryTree) -> Value {
    let mut value = materialize(row, tree, tree.root());
    if let Value::Object(object) = &mut value {
        for (_, _, alias) in spec.aggregates() {
            let result = row.field(alias).unwrap_or(Value::Null);
            object.insert(alias.to_string(), result);
        }
    }
    value
}
