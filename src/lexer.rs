//! Primitive scanner for search queries.
//!
//! The lexer looks for the leftmost primitive starting at the cursor. Whatever
//! it skips over to get there must be whitespace; anything else is junk and
//! ends the scan with an error.
//!
//! At a given position the forms are tried in this order:
//!
//! ```text
//! (  )              brackets
//! AND  OR           boolean keywords, standalone only
//! dddddd-ddd        ticket id
//! x=" ... "         quoted condition, \" and \\ escapes
//! x=...             unquoted condition, runs to whitespace or a bracket
//! ```

use std::borrow::Cow;

use crate::error::InvalidSearchQuery;
use crate::token::{RelOp, Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Byte offset just past the last token produced
    position: usize,
    /// Set once an error has been yielded
    failed: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            failed: false,
        }
    }

    /// Scans forward from the cursor to the next primitive.
    ///
    /// Returns `Ok(None)` once only whitespace is left.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, InvalidSearchQuery> {
        let start = self.position;
        let mut cursor = start;

        while let Some(c) = self.input[cursor..].chars().next() {
            if let Some(token) = self.match_primitive(cursor) {
                let between = self.input[start..cursor].trim();
                if !between.is_empty() {
                    return Err(InvalidSearchQuery::JunkText {
                        text: between.to_string(),
                        span: Span::new(start, cursor),
                    });
                }
                self.position = token.span.end;
                return Ok(Some(token));
            }
            cursor += c.len_utf8();
        }

        self.position = self.input.len();
        let trailing = self.input[start..].trim();
        if trailing.is_empty() {
            Ok(None)
        } else {
            Err(InvalidSearchQuery::TrailingJunk {
                text: trailing.to_string(),
                span: Span::new(start, self.input.len()),
            })
        }
    }

    fn match_primitive(&self, pos: usize) -> Option<Token<'a>> {
        let rest = &self.input[pos..];
        let token = |kind, len: usize| Token {
            kind,
            span: Span::new(pos, pos + len),
        };

        match rest.chars().next()? {
            '(' => Some(token(TokenKind::OpenParen, 1)),
            ')' => Some(token(TokenKind::CloseParen, 1)),
            _ => {
                if self.keyword_at(pos, "AND") {
                    return Some(token(TokenKind::And, 3));
                }
                if self.keyword_at(pos, "OR") {
                    return Some(token(TokenKind::Or, 2));
                }
                if is_ticket_id(rest) {
                    return Some(token(TokenKind::TicketId(&rest[..TICKET_ID_LEN]), TICKET_ID_LEN));
                }
                self.match_condition(pos)
            }
        }
    }

    /// `AND`/`OR` only count when they are not glued to surrounding text.
    fn keyword_at(&self, pos: usize, keyword: &str) -> bool {
        if !self.input[pos..].starts_with(keyword) {
            return false;
        }
        let before = self.input[..pos].chars().next_back();
        let after = self.input[pos + keyword.len()..].chars().next();
        before.map_or(true, is_separator) && after.map_or(true, is_separator)
    }

    fn match_condition(&self, pos: usize) -> Option<Token<'a>> {
        let rest = &self.input[pos..];
        let field = rest.chars().next().filter(char::is_ascii_lowercase)?;
        let (op, value_text) = RelOp::strip_prefix(&rest[1..])?;
        let value_start = pos + 1 + op.as_str().len();

        if let Some(body) = value_text.strip_prefix('"') {
            if let Some((len, value)) = read_quoted(body) {
                return Some(Token {
                    kind: TokenKind::Condition {
                        field,
                        op,
                        value,
                        quoted: true,
                    },
                    // opening quote + body + closing quote
                    span: Span::new(pos, value_start + len + 2),
                });
            }
        }

        let len = value_text
            .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .unwrap_or(value_text.len());
        Some(Token {
            kind: TokenKind::Condition {
                field,
                op,
                value: Cow::Borrowed(&value_text[..len]),
                quoted: false,
            },
            span: Span::new(pos, value_start + len),
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, InvalidSearchQuery>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_token() {
            Ok(token) => token.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Tokenizes the whole query, stopping at the first error.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, InvalidSearchQuery> {
    Lexer::new(input).collect()
}

const TICKET_ID_LEN: usize = 10;

fn is_ticket_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= TICKET_ID_LEN
        && bytes[..6].iter().all(u8::is_ascii_digit)
        && bytes[6] == b'-'
        && bytes[7..TICKET_ID_LEN].iter().all(u8::is_ascii_digit)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

/// Reads a quoted body (opening quote already stripped) up to the closing quote.
///
/// Returns the body length in bytes, not counting the closing quote, and the
/// unescaped value. `None` when the quote is never closed.
fn read_quoted(body: &str) -> Option<(usize, Cow<'_, str>)> {
    let mut chars = body.char_indices();
    let mut escaped = false;

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(body[i + 1..].chars().next(), Some('"' | '\\')) => {
                chars.next();
                escaped = true;
            }
            '"' => {
                let raw = &body[..i];
                let value = if escaped {
                    Cow::Owned(unescape(raw))
                } else {
                    Cow::Borrowed(raw)
                };
                return Some((i, value));
            }
            _ => {}
        }
    }
    None
}

/// Only `\"` and `\\` are escapes; any other backslash is literal.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next @ ('"' | '\\')) = chars.peek() {
                out.push(next);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}
