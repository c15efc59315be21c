//! Per-request error taxonomy.

use thiserror::Error;

use crate::exec::ExecutionError;
use crate::lang::SyntaxError;
use crate::planner::ResolutionError;

/// Anything that can fail while answering one query.
///
/// A failure at any stage discards everything built for the request so far.
#[derive(Debug, Error)]
pub enum CqlError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Aggregate {function} is selected more than once; both would be named '{alias}'")]
    AggregationAliasCollision { function: String, alias: String },

    #[error("Comparison has no field operand: {0}")]
    LiteralComparison(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl CqlError {
    /// Whether the request itself was at fault, as opposed to the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CqlError::Execution(_))
    }
}

pub type CqlResult<T> = Result<T, CqlError>;
