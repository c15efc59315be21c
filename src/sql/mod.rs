//! Rendering of a [`CompiledSpec`](crate::planner::CompiledSpec) as SQL text.
//!
//! The output targets PostgreSQL: double-quoted identifiers, single-quoted
//! string literals, `<>` for inequality. XOR between predicates is written
//! as `<>` between the two boolean operands.

pub mod render;
pub mod token;

pub use token::{Token, TokenStream};
