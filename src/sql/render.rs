//! Token rendering of compiled queries.

use crate::lang::{Comparator, Literal, LogicalOperator};
use crate::planner::{
    ColumnRef, CompiledSpec, Join, Predicate, PredicateValue, Resolved, SelectExpr, TableRef,
};

use super::token::{Token, TokenStream};

fn column_tokens(column: &ColumnRef) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Ident(column.relation.clone()))
        .push(Token::Dot)
        .push(Token::Ident(column.column.clone()));
    ts
}

fn resolved_tokens(resolved: &Resolved) -> TokenStream {
    match resolved {
        Resolved::Column(column) => column_tokens(column),
        Resolved::Table { relation } => {
            let mut ts = TokenStream::new();
            ts.push(Token::Ident(relation.clone()))
                .push(Token::Dot)
                .push(Token::Star);
            ts
        }
    }
}

fn table_tokens(table: &TableRef) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Ident(table.table.clone()));
    if table.table != table.binding() {
        ts.space()
            .push(Token::As)
            .space()
            .push(Token::Ident(table.binding().to_string()));
    }
    ts
}

fn select_tokens(expr: &SelectExpr) -> TokenStream {
    let mut ts = TokenStream::new();
    match expr.aggregate {
        Some(function) => {
            ts.push(Token::FunctionName(function.keyword().to_string()))
                .lparen()
                .append(&resolved_tokens(&expr.expr))
                .rparen();
        }
        None => {
            ts.append(&resolved_tokens(&expr.expr));
        }
    }
    if let Some(alias) = &expr.alias {
        ts.space()
            .push(Token::As)
            .space()
            .push(Token::Ident(alias.clone()));
    }
    ts
}

fn join_tokens(join: &Join) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Inner)
        .space()
        .push(Token::Join)
        .space()
        .append(&table_tokens(&join.right))
        .space()
        .push(Token::On)
        .space()
        .append(&column_tokens(&join.on.left))
        .space()
        .push(Token::Eq)
        .space()
        .append(&column_tokens(&join.on.right));
    ts
}

fn comparator_token(op: Comparator) -> Token {
    match op {
        Comparator::Eq => Token::Eq,
        Comparator::Ne => Token::Ne,
        Comparator::Lt => Token::Lt,
        Comparator::Gt => Token::Gt,
        Comparator::Le => Token::Lte,
        Comparator::Ge => Token::Gte,
    }
}

fn literal_token(literal: &Literal) -> Token {
    match literal {
        Literal::Integer(n) => Token::LitInt(*n),
        Literal::String(s) => Token::LitString(s.clone()),
    }
}

fn predicate_tokens(predicate: &Predicate) -> TokenStream {
    let mut ts = TokenStream::new();
    match predicate {
        Predicate::Compare { column, op, value } => {
            ts.append(&column_tokens(column))
                .space()
                .push(comparator_token(*op))
                .space();
            match value {
                PredicateValue::Literal(lit) => ts.push(literal_token(lit)),
                PredicateValue::Column(other) => ts.append(&column_tokens(other)),
            };
        }
        Predicate::Logical { left, op, right } => {
            let (token, wrap_all) = match op {
                LogicalOperator::And => (Token::And, false),
                LogicalOperator::Or => (Token::Or, false),
                LogicalOperator::Xor => (Token::Ne, true),
            };
            operand_tokens(&mut ts, left, wrap_all);
            ts.space().push(token).space();
            operand_tokens(&mut ts, right, wrap_all);
        }
    }
    ts
}

/// Nested logical predicates keep their grouping through parentheses.
fn operand_tokens(ts: &mut TokenStream, predicate: &Predicate, always: bool) {
    let inner = predicate_tokens(predicate);
    if always || matches!(predicate, Predicate::Logical { .. }) {
        ts.lparen().append(&inner).rparen();
    } else {
        ts.append(&inner);
    }
}

fn list_tokens<T>(items: &[T], render: impl Fn(&T) -> TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&render(item));
    }
    ts
}

impl CompiledSpec {
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .append(&list_tokens(&self.select, select_tokens))
            .newline()
            .push(Token::From)
            .space()
            .append(&table_tokens(&self.model));

        for join in &self.joins {
            ts.newline().append(&join_tokens(join));
        }
        if let Some(predicate) = &self.predicate {
            ts.newline()
                .push(Token::Where)
                .space()
                .append(&predicate_tokens(predicate));
        }
        if !self.group_by.is_empty() {
            ts.newline()
                .push(Token::GroupBy)
                .space()
                .append(&list_tokens(&self.group_by, resolved_tokens));
        }
        if !self.order_by.is_empty() {
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .append(&list_tokens(&self.order_by, resolved_tokens));
        }
        ts.newline()
            .push(Token::Limit)
            .space()
            .push(Token::LitInt(self.limit as i64));
        ts
    }

    /// Render as a single PostgreSQL statement, one clause per line.
    pub fn to_sql(&self) -> String {
        self.to_tokens().serialize()
    }
}
