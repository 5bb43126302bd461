//! # Filter Expression Grammar
//!
//! Tokenizer and parser for the client-facing filter language. The compiler in
//! [`crate::filtering`] consumes it only through [`parse`], which turns a raw
//! filter string into a tree of [`ExprGroup`]s.
//!
//! ## Grammar
//!
//! ```text
//! groups   = item { join item }
//! join     = "&&" / "||"
//! item     = "(" groups ")" / expr
//! expr     = operand sign operand
//! sign     = "=" / "!=" / "~" / "!~" / "<" / "<=" / ">" / ">="
//! operand  = identifier / text / number / function
//! function = identifier "(" [ operand { "," operand } ] ")"
//! ```
//!
//! Identifiers start with a letter, `_`, `@` or `#` and may contain `.` and `:`.
//! Text is single or double quoted; a backslash escapes the active quote or
//! another backslash. `// ...` comments run to the end of the line.
//!
//! ## Example
//!
//! ```rust
//! use searchcrate::fexpr::{self, ExprItem, JoinOp, SignOp, Token};
//!
//! let groups = fexpr::parse("title ~ 'lorem' && (views > 10 || featured = true)").unwrap();
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[1].join, JoinOp::And);
//! let ExprItem::Expr(first) = &groups[0].item else { unreachable!() };
//! assert_eq!(first.left, Token::Identifier("title".into()));
//! assert_eq!(first.op, SignOp::Like);
//! ```

mod parser;
mod scanner;

use std::fmt;
use std::str::FromStr;

use crate::errors::SearchError;

/// An invalid filter string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the raw filter string
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// How a group is combined with the groups before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOp {
    And,
    Or,
}

impl fmt::Display for JoinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("&&"),
            Self::Or => f.write_str("||"),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignOp {
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `~` (contains)
    Like,
    /// `!~` (not contains)
    NotLike,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl SignOp {
    pub const ALL: [Self; 8] = [
        Self::Eq,
        Self::Neq,
        Self::Like,
        Self::NotLike,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Like => "~",
            Self::NotLike => "!~",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

impl fmt::Display for SignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignOp {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| SearchError::UnknownOperator(s.to_string()))
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Identifier(String),
    Text(String),
    Number(f64),
    Function { name: String, args: Vec<Token> },
}

impl Token {
    /// The token as the client wrote it (text without its quotes).
    #[must_use]
    pub fn literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => f.write_str(name),
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A binary comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub left: Token,
    pub op: SignOp,
    pub right: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprItem {
    Expr(Expr),
    Group(Vec<ExprGroup>),
}

/// An expression or a parenthesized list of groups, joined to its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprGroup {
    pub join: JoinOp,
    pub item: ExprItem,
}

/// Parse a raw filter string.
///
/// Blank input (whitespace and comments only) yields an empty list.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first invalid character or token.
pub fn parse(input: &str) -> Result<Vec<ExprGroup>, ParseError> {
    parser::Parser::parse(input)
}
