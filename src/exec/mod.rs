//! Execution adapter interface.
//!
//! An [`Executor`] runs a [`CompiledSpec`] against some store and hands back
//! rows of the queried model. Rows expose plain fields by name and related
//! rows by relation name; the materializer needs nothing else.

mod memory;

pub use memory::{MemoryRow, MemoryStore};

use serde_json::Value;
use thiserror::Error;

use crate::planner::CompiledSpec;

/// Failure raised by an executor, surfaced unchanged to the caller.
#[derive(Debug, Error)]
#[error("Execution failed: {0}")]
pub struct ExecutionError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl ExecutionError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into().into())
    }
}

/// Rows reached through a relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related<R> {
    /// A to-one relation; `None` when the foreign key is unset or dangling.
    One(Option<R>),
    Many(Vec<R>),
}

/// A row returned by an executor.
pub trait Row: Sized {
    /// Value of a plain field, or of an extra output column such as an
    /// aggregate alias.
    fn field(&self, name: &str) -> Option<Value>;

    /// Rows reached through relation `name`, `None` if there is no such relation.
    fn related(&self, name: &str) -> Option<Related<Self>>;
}

pub trait Executor {
    type Row: Row;

    fn execute(&self, spec: &CompiledSpec) -> Result<Vec<Self::Row>, ExecutionError>;
}
