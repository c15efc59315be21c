//! SQL Tokens - the atomic units of SQL output.
//!
//! Identifiers and string literals are quoted at serialization time, so
//! rendering code never concatenates raw user text.

/// SQL Token - every element the renderer emits.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    As,
    On,
    Inner,
    Join,
    GroupBy,
    OrderBy,
    Limit,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace ===
    Space,
    Newline,

    // === Dynamic Content ===
    /// Identifier (table, column, alias), always double-quoted
    Ident(String),
    /// Integer literal
    LitInt(i64),
    /// String literal
    LitString(String),
    /// Function name, rendered upper-case
    FunctionName(String),
}

impl Token {
    /// Serialize this token to PostgreSQL-flavoured text.
    pub fn serialize(&self) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Inner => "INNER".into(),
            Token::Join => "JOIN".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Limit => "LIMIT".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),

            Token::Space => " ".into(),
            Token::Newline => "\n".into(),

            Token::Ident(name) => format!("\"{}\"", name.replace('"', "\"\"")),
            Token::LitInt(n) => n.to_string(),
            Token::LitString(s) => format!("'{}'", s.replace('\'', "''")),
            Token::FunctionName(name) => name.to_uppercase(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self) -> String {
        self.tokens.iter().map(Token::serialize).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
