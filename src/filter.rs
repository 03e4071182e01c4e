//! The compiled form of a query: fragments in source order plus the values
//! they reference.
//!
//! User-supplied values only ever live in the [`ParamTable`]; fragments refer
//! to them by name.

use std::fmt;

use serde::Serialize;

use crate::token::RelOp;

/// Synthetic parameter name, rendered as `:1`, `:2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParamName(pub u32);

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{:?}", s),
            ParamValue::Integer(n) => write!(f, "{}", n),
            ParamValue::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Ordered parameter bindings with monotonically assigned names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamTable {
    entries: Vec<(ParamName, ParamValue)>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under a fresh name and returns that name.
    pub fn bind(&mut self, value: ParamValue) -> ParamName {
        let name = ParamName(self.entries.len() as u32 + 1);
        self.entries.push((name, value));
        name
    }

    pub fn get(&self, name: ParamName) -> Option<&ParamValue> {
        // names are dense and start at 1
        let index = (name.0 as usize).checked_sub(1)?;
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ParamName, ParamValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Escape character for LIKE patterns. `!` needs no quoting in any SQL dialect.
pub const LIKE_ESCAPE: char = '!';

/// Columns of the `tickets` table a predicate can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Column {
    Id,
    Description,
    Priority,
    Project,
    Status,
    TotalMinutes,
    MinutesRemaining,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Description => "description",
            Column::Priority => "priority",
            Column::Project => "project",
            Column::Status => "status",
            Column::TotalMinutes => "total_minutes",
            Column::MinutesRemaining => "minutes_remaining",
        }
    }
}

/// One-to-many relations hanging off a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Assignment,
    Listening,
    Keyword,
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Relation::Assignment => "assignments",
            Relation::Listening => "listening",
            Relation::Keyword => "keyword_assoc",
        }
    }

    /// The column compared against the bound value.
    pub fn value_column(self) -> &'static str {
        match self {
            Relation::Assignment | Relation::Listening => "user",
            Relation::Keyword => "keyword",
        }
    }
}

/// A single value-bearing test against a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Predicate {
    /// `tickets.<column> <op> :n`
    Compare { column: Column, op: RelOp, param: ParamName },
    /// `tickets.<column> [NOT] LIKE :n ESCAPE '!'`
    Like { column: Column, negated: bool, param: ParamName },
    /// `[NOT] EXISTS (related row whose value = :n)`
    Related { relation: Relation, negated: bool, param: ParamName },
}

impl Predicate {
    pub fn param(&self) -> ParamName {
        match self {
            Predicate::Compare { param, .. }
            | Predicate::Like { param, .. }
            | Predicate::Related { param, .. } => *param,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, param } => {
                write!(f, "tickets.{} {} {}", column.name(), op, param)
            }
            Predicate::Like { column, negated, param } => {
                let not = if *negated { "NOT " } else { "" };
                write!(
                    f,
                    "tickets.{} {}LIKE {} ESCAPE '{}'",
                    column.name(),
                    not,
                    param,
                    LIKE_ESCAPE
                )
            }
            Predicate::Related { relation, negated, param } => {
                let not = if *negated { "NOT " } else { "" };
                write!(
                    f,
                    "{}EXISTS (SELECT 1 FROM {t} WHERE {t}.{c} = {p} AND {t}.ticket_id = tickets.id)",
                    not,
                    t = relation.table(),
                    c = relation.value_column(),
                    p = param
                )
            }
        }
    }
}

/// A compiled primitive. Brackets and keywords pass through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Fragment {
    OpenParen,
    CloseParen,
    And,
    Or,
    Predicate(Predicate),
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::OpenParen => f.write_str("("),
            Fragment::CloseParen => f.write_str(")"),
            Fragment::And => f.write_str("AND"),
            Fragment::Or => f.write_str("OR"),
            Fragment::Predicate(p) => write!(f, "{}", p),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledFilter {
    pub fragments: Vec<Fragment>,
    pub params: ParamTable,
}

impl CompiledFilter {
    /// An empty filter matches every ticket.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Renders the filter as a readable WHERE clause, followed by the bindings.
impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clause: Vec<String> = self.fragments.iter().map(|frag| frag.to_string()).collect();
        write!(f, "{}", clause.join(" "))?;
        for (name, value) in self.params.iter() {
            write!(f, "\n  {} = {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_names_are_monotonic() {
        let mut params = ParamTable::new();
        let a = params.bind(ParamValue::Text("alice".to_string()));
        let b = params.bind(ParamValue::Integer(3));
        let c = params.bind(ParamValue::Float(90.0));
        assert_eq!((a, b, c), (ParamName(1), ParamName(2), ParamName(3)));
        assert_eq!(params.get(b), Some(&ParamValue::Integer(3)));
        assert_eq!(params.get(ParamName(0)), None);
        assert_eq!(params.get(ParamName(4)), None);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_render() {
        let mut params = ParamTable::new();
        let user = params.bind(ParamValue::Text("bob".to_string()));
        let prio = params.bind(ParamValue::Integer(2));
        let filter = CompiledFilter {
            fragments: vec![
                Fragment::OpenParen,
                Fragment::Predicate(Predicate::Related {
                    relation: Relation::Assignment,
                    negated: true,
                    param: user,
                }),
                Fragment::CloseParen,
                Fragment::Or,
                Fragment::Predicate(Predicate::Compare {
                    column: Column::Priority,
                    op: RelOp::Lte,
                    param: prio,
                }),
            ],
            params,
        };
        assert_eq!(
            filter.to_string(),
            "( NOT EXISTS (SELECT 1 FROM assignments WHERE assignments.user = :1 \
             AND assignments.ticket_id = tickets.id) ) OR tickets.priority <= :2\n  \
             :1 = \"bob\"\n  :2 = 2"
        );
    }
}
