//! # CQL
//!
//! A small query language for nested, relational data. Callers name a
//! model and the dotted paths they want; the compiler works out the joins.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       CQL text                          │
//! │  MODEL: project SELECT: (name, owner.login) WHERE: ...  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [lang]
//! ┌─────────────────────────────────────────────────────────┐
//! │                         AST                             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner + catalog]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │       CompiledSpec       │   │        QueryTree         │
//! │ joins, select, predicate │   │  one node per path       │
//! └──────────────────────────┘   └──────────────────────────┘
//!              │ [sql] / [exec]                │
//!              ▼                               │
//! ┌──────────────────────────┐                 │
//! │      rows from store     │─────────────────┤
//! └──────────────────────────┘                 ▼ [materialize]
//!                                ┌──────────────────────────┐
//!                                │    nested JSON result    │
//!                                └──────────────────────────┘
//! ```

pub mod catalog;
pub mod compile;
pub mod config;
pub mod error;
pub mod exec;
pub mod lang;
pub mod materialize;
pub mod planner;
pub mod sql;
pub mod tree;

pub use compile::{compile, query, CompileOptions, CompileOutput};
pub use error::{CqlError, CqlResult};
