//! Lexer for CQL.
//!
//! Converts query text into a sequence of tokens with span information.
//! Clause and aggregate keywords include their trailing colon (`MODEL:`,
//! `SUM:`), so `SUM` on its own is an ordinary identifier.

use chumsky::prelude::*;

/// A token in CQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Clause Keywords
    // ========================================================================
    Model,
    Select,
    GroupBy,
    OrderBy,
    Where,

    // ========================================================================
    // Aggregate Keywords
    // ========================================================================
    Sum,
    Avg,
    Count,
    Min,
    Max,

    // ========================================================================
    // Logical Operators
    // ========================================================================
    And,
    Or,
    Xor,

    // ========================================================================
    // Literals
    // ========================================================================
    /// An identifier (not a keyword).
    Ident(&'src str),
    /// An integer literal, sign included.
    Integer(&'src str),
    /// A string literal (raw contents without quotes, escapes unprocessed).
    Str(&'src str),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Model => write!(f, "MODEL:"),
            Token::Select => write!(f, "SELECT:"),
            Token::GroupBy => write!(f, "GROUPBY:"),
            Token::OrderBy => write!(f, "ORDERBY:"),
            Token::Where => write!(f, "WHERE:"),

            Token::Sum => write!(f, "SUM:"),
            Token::Avg => write!(f, "AVG:"),
            Token::Count => write!(f, "COUNT:"),
            Token::Min => write!(f, "MIN:"),
            Token::Max => write!(f, "MAX:"),

            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Xor => write!(f, "XOR"),

            Token::Ident(s) => write!(f, "{}", s),
            Token::Integer(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "\"{}\"", s),

            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::GtEq => write!(f, ">="),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
        }
    }
}

/// Map a word (and whether a colon followed it) to a keyword or identifier.
fn classify_word(word: &str, colon: bool) -> Option<Token<'_>> {
    let token = match (word, colon) {
        ("MODEL", true) => Token::Model,
        ("SELECT", true) => Token::Select,
        ("GROUPBY", true) => Token::GroupBy,
        ("ORDERBY", true) => Token::OrderBy,
        ("WHERE", true) => Token::Where,

        ("SUM", true) => Token::Sum,
        ("AVG", true) => Token::Avg,
        ("COUNT", true) => Token::Count,
        ("MIN", true) => Token::Min,
        ("MAX", true) => Token::Max,

        ("AND", false) => Token::And,
        ("OR", false) => Token::Or,
        ("XOR", false) => Token::Xor,

        (_, true) => return None,
        (word, false) => Token::Ident(word),
    };
    Some(token)
}

/// A quoted string body. A backslash escapes the following character.
fn quoted<'src>(
    quote: char,
) -> impl Parser<'src, &'src str, &'src str, extra::Err<Rich<'src, char>>> + Clone {
    let escaped = just('\\').then(any()).ignored();
    let plain = any()
        .filter(move |c: &char| *c != quote && *c != '\\')
        .ignored();

    just(quote)
        .ignore_then(escaped.or(plain).repeated().to_slice())
        .then_ignore(just(quote))
}

/// Create a lexer for CQL.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    // Identifiers: a letter followed by letters, digits or underscores
    let ident = any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice();

    let word = ident
        .then(just(':').or_not())
        .try_map(|(word, colon): (&str, Option<char>), span| {
            classify_word(word, colon.is_some())
                .ok_or_else(|| Rich::custom(span, format!("unknown keyword `{}:`", word)))
        });

    // Integers: no literal zero and no leading zeros
    let integer = just('-')
        .or_not()
        .then(one_of("123456789"))
        .then(any().filter(|c: &char| c.is_ascii_digit()).repeated())
        .to_slice()
        .map(Token::Integer);

    let string_lit = quoted('"').or(quoted('\'')).map(Token::Str);

    // Symbols (multi-char first, then single-char)
    let symbol = choice((
        just("==").to(Token::EqEq),
        just("!=").to(Token::NotEq),
        just(">=").to(Token::GtEq),
        just("<=").to(Token::LtEq),
        just('>').to(Token::Gt),
        just('<').to(Token::Lt),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
    ));

    let token = choice((word, integer, string_lit, symbol)).map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Lex a source string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lexing errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}
