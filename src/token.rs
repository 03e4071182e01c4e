//! The token definition for the search query language.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// A token is a single primitive of the query, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Brackets
    OpenParen,  // (
    CloseParen, // )

    // Boolean keywords
    And, // "AND"
    Or,  // "OR"

    /// A bare ticket id, `DDDDDD-DDD`.
    TicketId(&'a str),

    /// `<field><op><value>`; `value` is already unescaped for quoted conditions.
    Condition {
        field: char,
        op: RelOp,
        value: Cow<'a, str>,
        quoted: bool,
    },
}

impl TokenKind<'_> {
    /// Conditions and ticket ids are "searchable"; two of them in a row get an
    /// implicit AND.
    pub fn is_searchable(&self) -> bool {
        matches!(self, TokenKind::TicketId(_) | TokenKind::Condition { .. })
    }
}

/// Relational operators accepted between a field letter and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelOp {
    Eq,    // =
    NotEq, // !=
    Lte,   // <=
    Gte,   // >=
    Lt,    // <
    Gt,    // >
}

impl RelOp {
    /// Every operator, longest spelling first so that prefix matching is greedy.
    pub const ALL: [RelOp; 6] = [
        RelOp::NotEq,
        RelOp::Lte,
        RelOp::Gte,
        RelOp::Eq,
        RelOp::Lt,
        RelOp::Gt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelOp::Eq => "=",
            RelOp::NotEq => "!=",
            RelOp::Lte => "<=",
            RelOp::Gte => ">=",
            RelOp::Lt => "<",
            RelOp::Gt => ">",
        }
    }

    /// Matches the operator at the start of `s`, if any.
    pub fn strip_prefix(s: &str) -> Option<(RelOp, &str)> {
        RelOp::ALL
            .iter()
            .find_map(|op| s.strip_prefix(op.as_str()).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
