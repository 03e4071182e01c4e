//! Structural parser for compiled fragment sequences.
//!
//! ## Grammar
//!
//! ```text
//! filter   := or_expr?
//! or_expr  := and_expr ( OR and_expr )*
//! and_expr := primary ( AND primary )*
//! primary  := "(" or_expr ")" | predicate
//! ```
//!
//! AND binds tighter than OR. Brackets nest up to [`MAX_NESTING`] levels;
//! operator chains of any length parse into a single n-ary node. Anything
//! that does not fit (unbalanced brackets, dangling or doubled operators,
//! brackets nested too deep) is a [`ParseError`].

use std::fmt;

use crate::ast::FilterExpr;
use crate::filter::Fragment;

/// Deepest bracket nesting accepted in a filter.
pub const MAX_NESTING: usize = 64;

pub struct Parser<'a> {
    fragments: &'a [Fragment],
    position: usize,
    /// Brackets currently open
    depth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Index of the offending fragment, `None` at end of input.
    pub position: Option<usize>,
}

impl ParseError {
    fn new(message: String, position: Option<usize>) -> Self {
        Self { message, position }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} (at primitive {})", self.message, pos + 1),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl<'a> Parser<'a> {
    pub fn new(fragments: &'a [Fragment]) -> Self {
        Self {
            fragments,
            position: 0,
            depth: 0,
        }
    }

    /// Current fragment, without advancing.
    fn peek(&self) -> Option<&'a Fragment> {
        self.fragments.get(self.position)
    }

    /// Current fragment, advancing past it.
    fn advance(&mut self) -> Option<&'a Fragment> {
        let fragment = self.fragments.get(self.position);
        if fragment.is_some() {
            self.position += 1;
        }
        fragment
    }

    fn match_fragment(&self, expected: &Fragment) -> bool {
        self.peek() == Some(expected)
    }

    /// Parses the whole sequence. An empty sequence has no expression.
    pub fn parse(&mut self) -> Result<Option<FilterExpr<'a>>, ParseError> {
        if self.fragments.is_empty() {
            return Ok(None);
        }

        let expr = self.parse_or_expression()?;

        if let Some(fragment) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected '{}'", short(fragment)),
                Some(self.position),
            ));
        }

        Ok(Some(expr))
    }

    /// `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<FilterExpr<'a>, ParseError> {
        let first = self.parse_and_expression()?;
        if !self.match_fragment(&Fragment::Or) {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.match_fragment(&Fragment::Or) {
            self.advance();
            operands.push(self.parse_and_expression()?);
        }

        Ok(FilterExpr::Or(operands))
    }

    /// `primary (AND primary)*`
    fn parse_and_expression(&mut self) -> Result<FilterExpr<'a>, ParseError> {
        let first = self.parse_primary_expression()?;
        if !self.match_fragment(&Fragment::And) {
            return Ok(first);
        }

        let mut operands = vec![first];
        while self.match_fragment(&Fragment::And) {
            self.advance();
            operands.push(self.parse_primary_expression()?);
        }

        Ok(FilterExpr::And(operands))
    }

    fn parse_primary_expression(&mut self) -> Result<FilterExpr<'a>, ParseError> {
        let position = self.position;
        match self.advance() {
            Some(Fragment::OpenParen) => {
                if self.depth == MAX_NESTING {
                    return Err(ParseError::new(
                        format!("brackets nested deeper than {} levels", MAX_NESTING),
                        Some(position),
                    ));
                }
                self.depth += 1;
                let expr = self.parse_or_expression()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Fragment::CloseParen) => Ok(FilterExpr::Grouped(Box::new(expr))),
                    Some(other) => Err(ParseError::new(
                        format!("expected ')', found '{}'", short(other)),
                        Some(self.position - 1),
                    )),
                    None => Err(ParseError::new(
                        format!("unclosed '(' opened at primitive {}", position + 1),
                        None,
                    )),
                }
            }
            Some(Fragment::Predicate(predicate)) => Ok(FilterExpr::Predicate(predicate)),
            Some(other) => Err(ParseError::new(
                format!("expected a condition, found '{}'", short(other)),
                Some(position),
            )),
            None => Err(ParseError::new(
                "query ends where a condition was expected".to_string(),
                None,
            )),
        }
    }
}

/// Keeps error messages readable: predicates are summarized, not rendered.
fn short(fragment: &Fragment) -> String {
    match fragment {
        Fragment::Predicate(_) => "condition".to_string(),
        other => other.to_string(),
    }
}
