//! The searchable ticket fields and what each one accepts.

use crate::model::ListKind;
use crate::token::RelOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Description,
    Assigned,
    Listening,
    Keyword,
    Project,
    Status,
    Priority,
    HoursSpent,
    HoursRemaining,
}

/// How a condition's raw value is turned into a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Partial, case-insensitive text match.
    Contains,
    /// Case-insensitive user name, matched against a one-to-many relation.
    User,
    /// Short name resolved to a list item id.
    ListItem(ListKind),
    Integer,
    /// Hours given by the user, stored as minutes.
    Hours,
}

#[derive(Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub letter: char,
    pub value_kind: ValueKind,
    pub allowed_ops: &'static [RelOp],
    pub help: &'static str,
}

const EQUALITY: &[RelOp] = &[RelOp::Eq, RelOp::NotEq];
const RELATIONAL: &[RelOp] = &RelOp::ALL;

pub static FIELDS: [FieldSpec; 9] = [
    FieldSpec {
        field: Field::Description,
        letter: 'd',
        value_kind: ValueKind::Contains,
        allowed_ops: EQUALITY,
        help: "Description contains",
    },
    FieldSpec {
        field: Field::Assigned,
        letter: 'a',
        value_kind: ValueKind::User,
        allowed_ops: EQUALITY,
        help: "Assigned to user",
    },
    FieldSpec {
        field: Field::Listening,
        letter: 'l',
        value_kind: ValueKind::User,
        allowed_ops: EQUALITY,
        help: "User is listening",
    },
    FieldSpec {
        field: Field::Keyword,
        letter: 'k',
        value_kind: ValueKind::ListItem(ListKind::Keyword),
        allowed_ops: EQUALITY,
        help: "Has keyword",
    },
    FieldSpec {
        field: Field::Project,
        letter: 'j',
        value_kind: ValueKind::ListItem(ListKind::Project),
        allowed_ops: EQUALITY,
        help: "Project",
    },
    FieldSpec {
        field: Field::Status,
        letter: 's',
        value_kind: ValueKind::ListItem(ListKind::Status),
        allowed_ops: EQUALITY,
        help: "Status",
    },
    FieldSpec {
        field: Field::Priority,
        letter: 'p',
        value_kind: ValueKind::Integer,
        allowed_ops: RELATIONAL,
        help: "Priority",
    },
    FieldSpec {
        field: Field::HoursSpent,
        letter: 'h',
        value_kind: ValueKind::Hours,
        allowed_ops: RELATIONAL,
        help: "Hours logged",
    },
    FieldSpec {
        field: Field::HoursRemaining,
        letter: 'r',
        value_kind: ValueKind::Hours,
        allowed_ops: RELATIONAL,
        help: "Hours remaining",
    },
];

impl Field {
    pub fn from_letter(letter: char) -> Option<Field> {
        FIELDS.iter().find(|s| s.letter == letter).map(|s| s.field)
    }

    pub fn spec(self) -> &'static FieldSpec {
        // FIELDS lists every variant exactly once, in declaration order
        &FIELDS[self as usize]
    }

    pub fn letter(self) -> char {
        self.spec().letter
    }

    pub fn value_kind(self) -> ValueKind {
        self.spec().value_kind
    }

    pub fn allows(self, op: RelOp) -> bool {
        self.spec().allowed_ops.contains(&op)
    }
}
