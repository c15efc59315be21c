//! CQL grammar: lexer, parser and AST.
//!
//! A query names a model, a select list, and optional grouping, ordering
//! and filtering clauses:
//!
//! ```text
//! MODEL: project
//! SELECT: (name, owner.login, SUM: issues.id)
//! GROUPBY: (owner.login)
//! ORDERBY: (name)
//! WHERE: owner.company == "Acme" AND (created_at > 5 OR name != 'x')
//! ```
//!
//! # Example
//!
//! ```
//! use cql::lang;
//!
//! let query = lang::parse("MODEL: project SELECT: (name, owner.login)").unwrap();
//! assert_eq!(query.model, "project");
//! assert_eq!(query.select.len(), 2);
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;

use std::fmt;
use std::ops::Range;

use chumsky::error::Rich;
use chumsky::span::SimpleSpan;

/// A byte range in the query text.
pub type Span = Range<usize>;

/// Malformed CQL text.
///
/// Carries the position of the earliest error and the set of tokens that
/// would have been accepted there.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at {}..{}: {message}", .span.start, .span.end)]
pub struct SyntaxError {
    pub span: Span,
    /// The offending token or character, `None` at end of input.
    pub found: Option<String>,
    /// Descriptions of what would have been accepted.
    pub expected: Vec<String>,
    pub message: String,
}

impl SyntaxError {
    fn from_rich<T: fmt::Display>(err: &Rich<'_, T, SimpleSpan>) -> Self {
        let span = err.span();
        Self {
            span: span.start..span.end,
            found: err.found().map(|t| t.to_string()),
            expected: err.expected().map(|p| p.to_string()).collect(),
            message: err.to_string(),
        }
    }

    /// Pick the error that occurs first in the source.
    fn earliest<T: fmt::Display>(errs: &[Rich<'_, T, SimpleSpan>]) -> Self {
        errs.iter()
            .min_by_key(|e| e.span().start)
            .map(Self::from_rich)
            .unwrap_or_else(|| Self {
                span: 0..0,
                found: None,
                expected: Vec::new(),
                message: "invalid query".to_string(),
            })
    }
}

/// Parse CQL text into a [`Query`].
pub fn parse(source: &str) -> Result<Query, SyntaxError> {
    use chumsky::input::Input;
    use chumsky::Parser as _;

    // Step 1: Lexical analysis
    let tokens = lexer::lex(source).map_err(|errs| SyntaxError::earliest(&errs))?;

    // Step 2: Parsing
    let len = source.len();
    let eoi: SimpleSpan = (len..len).into();
    let token_stream = tokens.as_slice().map(
        eoi,
        |(tok, span): &(lexer::Token<'_>, SimpleSpan)| (tok, span),
    );

    let query = parser::parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| SyntaxError::earliest(&errs))?;

    tracing::debug!(
        model = %query.model,
        select = query.select.len(),
        has_where = query.where_clause.is_some(),
        "parsed query"
    );
    Ok(query)
}
