//! Parser for CQL using chumsky.
//!
//! This module transforms a token stream from the lexer into a [`Query`] AST.

use chumsky::input::ValueInput;
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::Token;

/// Resolve backslash escapes in a raw string literal body.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Create the parser for a complete CQL query.
///
/// The parser is generic over the input type, accepting any `ValueInput`
/// that produces `Token` values with `SimpleSpan` spans.
pub fn parser<'tokens, 'src: 'tokens, I>(
) -> impl Parser<'tokens, I, Query, extra::Err<Rich<'tokens, Token<'src>, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = SimpleSpan>,
{
    // ==========================================================================
    // Basic token parsers
    // ==========================================================================

    let ident = select! {
        Token::Ident(s) => s.to_string(),
    }
    .labelled("identifier");

    let field_path = ident
        .clone()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .map(FieldPath::new)
        .labelled("field path");

    let aggregate = select! {
        Token::Sum => AggregateFunction::Sum,
        Token::Avg => AggregateFunction::Avg,
        Token::Count => AggregateFunction::Count,
        Token::Min => AggregateFunction::Min,
        Token::Max => AggregateFunction::Max,
    }
    .labelled("aggregate function");

    let integer = select! {
        Token::Integer(s) => s,
    }
    .try_map(|s: &str, span| {
        s.parse::<i64>()
            .map(Literal::Integer)
            .map_err(|_| Rich::custom(span, format!("integer literal {} is out of range", s)))
    });

    let string = select! {
        Token::Str(s) => Literal::String(unescape(s)),
    };

    let literal = integer.or(string).labelled("literal");

    let comparator = select! {
        Token::EqEq => Comparator::Eq,
        Token::GtEq => Comparator::Ge,
        Token::LtEq => Comparator::Le,
        Token::Gt => Comparator::Gt,
        Token::Lt => Comparator::Lt,
        Token::NotEq => Comparator::Ne,
    }
    .labelled("comparator");

    let logical_op = select! {
        Token::And => LogicalOperator::And,
        Token::Or => LogicalOperator::Or,
        Token::Xor => LogicalOperator::Xor,
    }
    .labelled("logical operator");

    // ==========================================================================
    // SELECT / GROUPBY / ORDERBY
    // ==========================================================================

    let select_item = aggregate
        .then(field_path.clone())
        .map(|(function, field)| SelectItem::Aggregation(Aggregation { function, field }))
        .or(field_path.clone().map(SelectItem::Field));

    let select_clause = just(Token::Select).ignore_then(
        select_item
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen)),
    );

    let path_list = field_path
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let group_by = just(Token::GroupBy).ignore_then(path_list.clone());
    let order_by = just(Token::OrderBy).ignore_then(path_list);

    // ==========================================================================
    // WHERE expressions
    // ==========================================================================

    let operand = field_path
        .map(Operand::Field)
        .or(literal.map(Operand::Literal));

    let comparison = operand
        .clone()
        .then(comparator)
        .then(operand)
        .try_map(|((first, comparator), second), span| match (&first, &second) {
            (Operand::Literal(_), Operand::Literal(_)) => Err(Rich::custom(
                span,
                "a comparison needs a field path on at least one side",
            )),
            _ => Ok(Comparison {
                first,
                comparator,
                second,
            }),
        });

    // Expression := (Comparison | "(" Expression ")") (LogicalOp Expression)?
    // The trailing recursion makes logical chains group to the right.
    let expression = recursive(|expr| {
        let atom = comparison
            .map(Expression::Comparison)
            .or(expr
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)));

        atom.then(logical_op.then(expr).or_not())
            .map(|(left, rest)| match rest {
                Some((op, right)) => Expression::Logical {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                None => left,
            })
    })
    .labelled("expression");

    let where_clause = just(Token::Where).ignore_then(expression);

    // ==========================================================================
    // Query
    // ==========================================================================

    let model = just(Token::Model).ignore_then(ident);

    model
        .then(select_clause)
        .then(group_by.or_not())
        .then(order_by.or_not())
        .then(where_clause.or_not())
        .then_ignore(end())
        .map(
            |((((model, select), group_by), order_by), where_clause)| Query {
                model,
                select,
                group_by,
                order_by,
                where_clause,
            },
        )
}
