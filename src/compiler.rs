//! Query compiler: turns the token stream into a [`CompiledFilter`].
//!
//! Brackets and keywords pass through unchanged. A bare ticket id becomes an
//! equality test on `tickets.id`. A condition is checked against its field's
//! metadata, its value normalized, and bound as a parameter. Two searchable
//! primitives in a row are joined with an implicit AND.

use crate::error::InvalidSearchQuery;
use crate::error::Result;
use crate::field::{Field, ValueKind};
use crate::filter::{
    Column, CompiledFilter, Fragment, ParamTable, ParamValue, Predicate, Relation, LIKE_ESCAPE,
};
use crate::lexer::Lexer;
use crate::store::ListItemResolver;
use crate::token::{RelOp, Token, TokenKind};

/// Hour values are rounded to this many minutes' decimal places after scaling.
const MINUTE_PRECISION: f64 = 1e6;

pub struct QueryCompiler<'r, R: ListItemResolver + ?Sized> {
    resolver: &'r R,
    fragments: Vec<Fragment>,
    params: ParamTable,
    previous_searchable: bool,
}

impl<'r, R: ListItemResolver + ?Sized> QueryCompiler<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self {
            resolver,
            fragments: Vec::new(),
            params: ParamTable::new(),
            previous_searchable: false,
        }
    }

    /// Compiles a whole query. The first lexing or field error aborts the
    /// compilation; no partial filter is returned.
    pub fn compile(mut self, query: &str) -> Result<CompiledFilter> {
        for token in Lexer::new(query) {
            self.push_token(token?)?;
        }

        Ok(CompiledFilter {
            fragments: self.fragments,
            params: self.params,
        })
    }

    fn push_token(&mut self, token: Token<'_>) -> Result<()> {
        let searchable = token.kind.is_searchable();
        if searchable && self.previous_searchable {
            self.fragments.push(Fragment::And);
        }
        self.previous_searchable = searchable;

        let fragment = match token.kind {
            TokenKind::OpenParen => Fragment::OpenParen,
            TokenKind::CloseParen => Fragment::CloseParen,
            TokenKind::And => Fragment::And,
            TokenKind::Or => Fragment::Or,
            TokenKind::TicketId(id) => {
                let param = self.params.bind(ParamValue::Text(id.to_string()));
                Fragment::Predicate(Predicate::Compare {
                    column: Column::Id,
                    op: RelOp::Eq,
                    param,
                })
            }
            TokenKind::Condition {
                field,
                op,
                value,
                quoted,
            } => Fragment::Predicate(self.compile_condition(field, op, &value, quoted)?),
        };

        self.fragments.push(fragment);
        Ok(())
    }

    fn compile_condition(&mut self, letter: char, op: RelOp, raw: &str, quoted: bool) -> Result<Predicate> {
        let field =
            Field::from_letter(letter).ok_or(InvalidSearchQuery::UnknownField { field: letter })?;

        if !field.allows(op) {
            return Err(InvalidSearchQuery::UnsupportedOperator { field: letter, op }.into());
        }

        if raw.is_empty() && !quoted {
            return Err(InvalidSearchQuery::MissingValue { field: letter }.into());
        }

        let value = self.convert_value(field, raw)?;
        let param = self.params.bind(value);
        let negated = op == RelOp::NotEq;

        let predicate = match field {
            Field::Description => Predicate::Like {
                column: Column::Description,
                negated,
                param,
            },
            Field::Assigned => Predicate::Related {
                relation: Relation::Assignment,
                negated,
                param,
            },
            Field::Listening => Predicate::Related {
                relation: Relation::Listening,
                negated,
                param,
            },
            Field::Keyword => Predicate::Related {
                relation: Relation::Keyword,
                negated,
                param,
            },
            Field::Project => Predicate::Compare {
                column: Column::Project,
                op,
                param,
            },
            Field::Status => Predicate::Compare {
                column: Column::Status,
                op,
                param,
            },
            Field::Priority => Predicate::Compare {
                column: Column::Priority,
                op,
                param,
            },
            Field::HoursSpent => Predicate::Compare {
                column: Column::TotalMinutes,
                op,
                param,
            },
            Field::HoursRemaining => Predicate::Compare {
                column: Column::MinutesRemaining,
                op,
                param,
            },
        };

        Ok(predicate)
    }

    fn convert_value(&self, field: Field, raw: &str) -> Result<ParamValue> {
        let invalid = || InvalidSearchQuery::InvalidValue {
            field: field.letter(),
            value: raw.to_string(),
        };

        let value = match field.value_kind() {
            ValueKind::Contains => ParamValue::Text(format!("%{}%", like_escape(raw))),
            ValueKind::User => ParamValue::Text(raw.to_string()),
            ValueKind::ListItem(kind) => {
                let id = self
                    .resolver
                    .resolve_list_item(kind, raw)?
                    .ok_or_else(|| InvalidSearchQuery::UnresolvedListItem {
                        kind,
                        name: raw.to_string(),
                    })?;
                ParamValue::Integer(id)
            }
            ValueKind::Integer => ParamValue::Integer(raw.trim().parse().map_err(|_| invalid())?),
            ValueKind::Hours => {
                let hours: f64 = raw.trim().parse().map_err(|_| invalid())?;
                if !hours.is_finite() {
                    return Err(invalid().into());
                }
                ParamValue::Float((hours * 60.0 * MINUTE_PRECISION).round() / MINUTE_PRECISION)
            }
        };

        Ok(value)
    }
}

/// Escapes LIKE wildcards (and the escape character itself) so the value
/// matches literally.
pub fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
