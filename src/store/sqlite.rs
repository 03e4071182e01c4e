//! SQLite-backed ticket store.
//!
//! Schema:
//!
//! - `tickets(id TEXT PRIMARY KEY, description, priority, project, status,
//!            total_minutes, minutes_remaining)`
//! - `assignments(ticket_id, user)` and `listening(ticket_id, user)`, with
//!   `user` declared `COLLATE NOCASE` so user matching ignores case
//! - `keyword_assoc(ticket_id, keyword)`
//! - `projects`, `statuses`, `keywords`: `(id INTEGER PRIMARY KEY, name
//!   COLLATE NOCASE, description)`
//!
//! Filters are parsed, compiled to a sea-query statement and run with the
//! statement's values bound positionally.

use std::path::Path;

use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use sea_query::{SqliteQueryBuilder, Value};

use super::{ListItemResolver, StoreError, TicketStore};
use crate::filter::CompiledFilter;
use crate::model::{ListItem, ListKind, NewTicket, Ticket, TicketId};
use crate::parser::Parser;
use crate::sql_compiler::SqlCompiler;

pub struct SqliteTicketStore {
    conn: Connection,
}

fn list_table(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Project => "projects",
        ListKind::Status => "statuses",
        ListKind::Keyword => "keywords",
    }
}

impl SqliteTicketStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!("opened ticket database {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL COLLATE NOCASE,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS statuses (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL COLLATE NOCASE,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS keywords (
                id          INTEGER PRIMARY KEY,
                name        TEXT NOT NULL COLLATE NOCASE,
                description TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS tickets (
                id                TEXT PRIMARY KEY,
                description       TEXT NOT NULL,
                priority          INTEGER NOT NULL DEFAULT 0,
                project           INTEGER REFERENCES projects(id),
                status            INTEGER REFERENCES statuses(id),
                total_minutes     INTEGER NOT NULL DEFAULT 0,
                minutes_remaining INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS assignments (
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                user      TEXT NOT NULL COLLATE NOCASE
            );

            CREATE TABLE IF NOT EXISTS listening (
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                user      TEXT NOT NULL COLLATE NOCASE
            );

            CREATE TABLE IF NOT EXISTS keyword_assoc (
                ticket_id TEXT NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                keyword   INTEGER NOT NULL REFERENCES keywords(id)
            );

            CREATE INDEX IF NOT EXISTS idx_assignments_ticket
                ON assignments(ticket_id);
            CREATE INDEX IF NOT EXISTS idx_listening_ticket
                ON listening(ticket_id);
            CREATE INDEX IF NOT EXISTS idx_keyword_assoc_ticket
                ON keyword_assoc(ticket_id);
        "#,
        )?;

        Ok(())
    }

    pub fn add_list_item(
        &self,
        kind: ListKind,
        short_name: &str,
        description: &str,
    ) -> Result<ListItem, StoreError> {
        self.conn.execute(
            &format!("INSERT INTO {} (name, description) VALUES (?1, ?2)", list_table(kind)),
            params![short_name.trim(), description.trim()],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(ListItem::new(kind, id, short_name, description))
    }

    pub fn list_items(&self, kind: ListKind) -> Result<Vec<ListItem>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, description FROM {} ORDER BY name ASC",
            list_table(kind)
        ))?;

        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let description: String = row.get(2)?;
            Ok(ListItem::new(kind, id, &name, &description))
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn list_item(&self, kind: ListKind, id: i64) -> Result<Option<ListItem>, StoreError> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT name, description FROM {} WHERE id = ?1", list_table(kind)),
                params![id],
                |row| {
                    let name: String = row.get(0)?;
                    let description: String = row.get(1)?;
                    Ok(ListItem::new(kind, id, &name, &description))
                },
            )
            .optional()?;
        Ok(item)
    }

    /// Inserts a ticket row and its associations in one transaction.
    pub fn insert_ticket(&mut self, ticket: &NewTicket) -> Result<TicketId, StoreError> {
        let id: TicketId = ticket.id.parse()?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO tickets (id, description, priority, project, status, total_minutes, minutes_remaining)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.as_str(),
                ticket.description,
                ticket.priority,
                ticket.project,
                ticket.status,
                ticket.minutes_spent,
                ticket.minutes_remaining,
            ],
        )?;

        for user in &ticket.assigned_users {
            tx.execute(
                "INSERT INTO assignments (ticket_id, user) VALUES (?1, ?2)",
                params![id.as_str(), user],
            )?;
        }
        for user in &ticket.listening_users {
            tx.execute(
                "INSERT INTO listening (ticket_id, user) VALUES (?1, ?2)",
                params![id.as_str(), user],
            )?;
        }
        for keyword in &ticket.keywords {
            tx.execute(
                "INSERT INTO keyword_assoc (ticket_id, keyword) VALUES (?1, ?2)",
                params![id.as_str(), keyword],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    /// Deletes a ticket and its associations. Returns whether it existed.
    pub fn delete_ticket(&mut self, id: &TicketId) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        for table in ["assignments", "listening", "keyword_assoc"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE ticket_id = ?1", table),
                params![id.as_str()],
            )?;
        }
        let removed = tx.execute("DELETE FROM tickets WHERE id = ?1", params![id.as_str()])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn related_strings(&self, sql: &str, id: &TicketId) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row?);
        }
        Ok(values)
    }

    fn ticket_keywords(&self, id: &TicketId) -> Result<Vec<ListItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT keywords.id, keywords.name, keywords.description
             FROM keyword_assoc JOIN keywords ON keywords.id = keyword_assoc.keyword
             WHERE keyword_assoc.ticket_id = ?1
             ORDER BY keywords.name ASC",
        )?;
        let rows = stmt.query_map(params![id.as_str()], |row| {
            let kid: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let description: String = row.get(2)?;
            Ok(ListItem::new(ListKind::Keyword, kid, &name, &description))
        })?;
        let mut keywords = Vec::new();
        for row in rows {
            keywords.push(row?);
        }
        Ok(keywords)
    }
}

/// SQLite messages for a statement that exceeds a compile-time limit.
const LIMIT_MESSAGES: [&str; 3] = [
    "Expression tree is too large",
    "too many SQL variables",
    "parser stack overflow",
];

/// A filter too large for SQLite to prepare is a malformed filter, not a
/// storage failure.
fn reject_oversized(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err {
        if LIMIT_MESSAGES.iter().any(|limit| message.contains(limit)) {
            return StoreError::MalformedFilter(format!("query is too large: {}", message));
        }
    }
    StoreError::Sqlite(err)
}

/// sea-query values to rusqlite values. Filters only ever bind text,
/// integers and floats.
fn to_sql_value(value: Value) -> Result<SqlValue, StoreError> {
    match value {
        Value::String(Some(s)) => Ok(SqlValue::Text(*s)),
        Value::BigInt(Some(n)) => Ok(SqlValue::Integer(n)),
        Value::Int(Some(n)) => Ok(SqlValue::Integer(n.into())),
        Value::Double(Some(x)) => Ok(SqlValue::Real(x)),
        other => Err(StoreError::MalformedFilter(format!(
            "cannot bind value {:?}",
            other
        ))),
    }
}

impl ListItemResolver for SqliteTicketStore {
    fn resolve_list_item(&self, kind: ListKind, short_name: &str) -> Result<Option<i64>, StoreError> {
        let id = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
                    list_table(kind)
                ),
                params![short_name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl TicketStore for SqliteTicketStore {
    fn execute_filter(&self, filter: &CompiledFilter) -> Result<Vec<TicketId>, StoreError> {
        let expr = Parser::new(&filter.fragments)
            .parse()
            .map_err(|e| StoreError::MalformedFilter(e.to_string()))?;

        let select = SqlCompiler::new(&filter.params).select_ticket_ids(expr.as_ref())?;
        let (sql, values) = select.build(SqliteQueryBuilder);
        debug!("executing search: {} with {} bound values", sql, values.0.len());

        let bound = values
            .0
            .into_iter()
            .map(to_sql_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(&sql).map_err(reject_oversized)?;
        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            let id: TicketId = row?.parse()?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn ticket_exists(&self, id: &TicketId) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM tickets WHERE id = ?1",
                params![id.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn hydrate_ticket(&self, id: &TicketId) -> Result<Option<Ticket>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT description, priority, project, status, total_minutes, minutes_remaining
                 FROM tickets WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((description, priority, project, status, minutes_spent, minutes_remaining)) = row
        else {
            return Ok(None);
        };

        let project = match project {
            Some(pid) => self.list_item(ListKind::Project, pid)?,
            None => None,
        };
        let status = match status {
            Some(sid) => self.list_item(ListKind::Status, sid)?,
            None => None,
        };

        Ok(Some(Ticket {
            id: id.clone(),
            description,
            priority,
            project,
            status,
            assigned_users: self.related_strings(
                "SELECT user FROM assignments WHERE ticket_id = ?1 ORDER BY user ASC",
                id,
            )?,
            listening_users: self.related_strings(
                "SELECT user FROM listening WHERE ticket_id = ?1 ORDER BY user ASC",
                id,
            )?,
            keywords: self.ticket_keywords(id)?,
            minutes_spent,
            minutes_remaining,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Fragment, ParamTable, ParamValue, Predicate, Relation};

    fn store_with_ticket() -> SqliteTicketStore {
        let mut store = SqliteTicketStore::open_in_memory().unwrap();
        let project = store.add_list_item(ListKind::Project, "tix", "Ticket tracker").unwrap();
        let status = store.add_list_item(ListKind::Status, "open", "").unwrap();
        let keyword = store.add_list_item(ListKind::Keyword, "ui", "").unwrap();
        store
            .insert_ticket(&NewTicket {
                id: "000001-001".to_string(),
                description: "Menu flickers".to_string(),
                priority: 3,
                project: Some(project.id),
                status: Some(status.id),
                assigned_users: vec!["Alice".to_string()],
                listening_users: vec!["bob".to_string(), "carol".to_string()],
                keywords: vec![keyword.id],
                minutes_spent: 90,
                minutes_remaining: 30,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_hydrate_ticket() {
        let store = store_with_ticket();
        let id: TicketId = "000001-001".parse().unwrap();
        let ticket = store.hydrate_ticket(&id).unwrap().unwrap();

        assert_eq!(ticket.description, "Menu flickers");
        assert_eq!(ticket.priority, 3);
        assert_eq!(ticket.project.unwrap().short_name, "tix");
        assert_eq!(ticket.status.unwrap().short_name, "open");
        assert_eq!(ticket.assigned_users, vec!["Alice"]);
        assert_eq!(ticket.listening_users, vec!["bob", "carol"]);
        assert_eq!(ticket.keywords.len(), 1);
        assert_eq!(ticket.minutes_spent, 90);
        assert!(store.ticket_exists(&id).unwrap());
    }

    #[test]
    fn test_missing_ticket() {
        let store = store_with_ticket();
        let id: TicketId = "999999-999".parse().unwrap();
        assert!(store.hydrate_ticket(&id).unwrap().is_none());
        assert!(!store.ticket_exists(&id).unwrap());
    }

    #[test]
    fn test_delete_ticket_removes_associations() {
        let mut store = store_with_ticket();
        let id: TicketId = "000001-001".parse().unwrap();
        assert!(store.delete_ticket(&id).unwrap());
        assert!(!store.delete_ticket(&id).unwrap());

        let leftover: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM listening", [], |row| row.get(0))
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_resolve_list_item_ignores_case() {
        let store = store_with_ticket();
        assert!(store.resolve_list_item(ListKind::Project, "TIX").unwrap().is_some());
        assert!(store.resolve_list_item(ListKind::Status, "Open").unwrap().is_some());
        assert!(store.resolve_list_item(ListKind::Status, "tix").unwrap().is_none());
        assert_eq!(store.list_items(ListKind::Keyword).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_malformed_fragments() {
        let store = store_with_ticket();
        let mut params = ParamTable::new();
        let user = params.bind(ParamValue::Text("alice".to_string()));
        let filter = CompiledFilter {
            fragments: vec![
                Fragment::Predicate(Predicate::Related {
                    relation: Relation::Assignment,
                    negated: false,
                    param: user,
                }),
                Fragment::Or,
            ],
            params,
        };
        assert!(matches!(
            store.execute_filter(&filter),
            Err(StoreError::MalformedFilter(_))
        ));
    }

    #[test]
    fn test_oversized_statement_is_malformed() {
        let too_deep = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some("Expression tree is too large (maximum depth 1000)".to_string()),
        );
        match reject_oversized(too_deep) {
            StoreError::MalformedFilter(detail) => assert!(detail.contains("too large"), "{}", detail),
            other => panic!("Expected MalformedFilter, got {:?}", other),
        }

        let locked = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        assert!(matches!(reject_oversized(locked), StoreError::Sqlite(_)));
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let store = store_with_ticket();
        let ids = store.execute_filter(&CompiledFilter::default()).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_invalid_ticket_id_is_rejected() {
        let mut store = SqliteTicketStore::open_in_memory().unwrap();
        let err = store.insert_ticket(&NewTicket::new("42", "bad id")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTicketId(_)));
    }
}
