//! The ticket store seen by the search compiler.
//!
//! The compiler only ever reads through these traits: short-name resolution
//! while compiling, filter execution and ticket hydration while executing.

mod sqlite;

pub use sqlite::SqliteTicketStore;

use thiserror::Error;

use crate::filter::{CompiledFilter, ParamName};
use crate::model::{InvalidTicketId, ListItem, ListKind, Ticket, TicketId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The fragment sequence does not form a valid boolean expression.
    #[error("{0}")]
    MalformedFilter(String),

    #[error("filter references unbound parameter {0}")]
    UnboundParameter(ParamName),

    #[error(transparent)]
    InvalidTicketId(#[from] InvalidTicketId),
}

/// Resolves a project, status or keyword short name to its id, ignoring case.
pub trait ListItemResolver {
    fn resolve_list_item(&self, kind: ListKind, short_name: &str) -> Result<Option<i64>, StoreError>;
}

pub trait TicketStore: ListItemResolver {
    /// Runs a compiled filter and returns matching ids ordered by priority,
    /// then project.
    fn execute_filter(&self, filter: &CompiledFilter) -> Result<Vec<TicketId>, StoreError>;

    fn ticket_exists(&self, id: &TicketId) -> Result<bool, StoreError>;

    /// Loads a ticket with its associations; `None` if it does not exist.
    fn hydrate_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StoreError>;
}

/// A fixed list of items, e.g. loaded once or built in tests.
impl ListItemResolver for [ListItem] {
    fn resolve_list_item(&self, kind: ListKind, short_name: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .iter()
            .find(|item| item.kind == kind && item.short_name.eq_ignore_ascii_case(short_name))
            .map(|item| item.id))
    }
}

impl ListItemResolver for Vec<ListItem> {
    fn resolve_list_item(&self, kind: ListKind, short_name: &str) -> Result<Option<i64>, StoreError> {
        self.as_slice().resolve_list_item(kind, short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_resolver_ignores_case_and_kind_mismatch() {
        let items = vec![
            ListItem::new(ListKind::Project, 1, "Tix", ""),
            ListItem::new(ListKind::Status, 2, "open", ""),
        ];
        assert_eq!(items.resolve_list_item(ListKind::Project, "tIX").unwrap(), Some(1));
        assert_eq!(items.resolve_list_item(ListKind::Status, "OPEN").unwrap(), Some(2));
        assert_eq!(items.resolve_list_item(ListKind::Keyword, "open").unwrap(), None);
        assert_eq!(items.resolve_list_item(ListKind::Project, "ti").unwrap(), None);
    }
}
