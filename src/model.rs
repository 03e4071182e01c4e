//! Ticket and list-item types owned by the ticket store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A ticket id in the fixed `DDDDDD-DDD` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{0}] is not a ticket id (expected DDDDDD-DDD)")]
pub struct InvalidTicketId(pub String);

impl TicketId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TicketId {
    type Err = InvalidTicketId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let valid = bytes.len() == 10
            && bytes[..6].iter().all(u8::is_ascii_digit)
            && bytes[6] == b'-'
            && bytes[7..].iter().all(u8::is_ascii_digit);
        if valid {
            Ok(TicketId(s.to_string()))
        } else {
            Err(InvalidTicketId(s.to_string()))
        }
    }
}

impl TryFrom<String> for TicketId {
    type Error = InvalidTicketId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three kinds of named reference entities a ticket points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Project,
    Status,
    Keyword,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListKind::Project => "Project",
            ListKind::Status => "Status",
            ListKind::Keyword => "Keyword",
        })
    }
}

/// A project, status or keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub kind: ListKind,
    pub id: i64,
    pub short_name: String,
    pub description: String,
}

impl ListItem {
    pub fn new(kind: ListKind, id: i64, short_name: &str, description: &str) -> Self {
        Self {
            kind,
            id,
            short_name: short_name.trim().to_string(),
            description: description.trim().to_string(),
        }
    }
}

impl fmt::Display for ListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.short_name)
        } else {
            write!(f, "{} - {}", self.short_name, self.description)
        }
    }
}

/// A fully loaded ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub description: String,
    pub priority: i64,
    pub project: Option<ListItem>,
    pub status: Option<ListItem>,
    pub assigned_users: Vec<String>,
    pub listening_users: Vec<String>,
    pub keywords: Vec<ListItem>,
    pub minutes_spent: i64,
    pub minutes_remaining: i64,
}

/// One line per ticket, the way search results are listed.
impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |item: &Option<ListItem>| {
            item.as_ref()
                .map_or_else(|| "?".to_string(), |i| i.short_name.clone())
        };
        write!(
            f,
            "{} | {:^6} | {} | {} | {}",
            self.id,
            self.priority,
            name(&self.project),
            name(&self.status),
            self.description
        )
    }
}

/// Everything needed to put a ticket row and its associations into a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTicket {
    pub id: String,
    pub description: String,
    pub priority: i64,
    pub project: Option<i64>,
    pub status: Option<i64>,
    pub assigned_users: Vec<String>,
    pub listening_users: Vec<String>,
    pub keywords: Vec<i64>,
    pub minutes_spent: i64,
    pub minutes_remaining: i64,
}

impl NewTicket {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_format() {
        assert!("123456-789".parse::<TicketId>().is_ok());
        assert!("12345-789".parse::<TicketId>().is_err());
        assert!("123456-7890".parse::<TicketId>().is_err());
        assert!("123456_789".parse::<TicketId>().is_err());
        assert!("abcdef-ghi".parse::<TicketId>().is_err());
    }

    #[test]
    fn test_ticket_id_serde() {
        let id: TicketId = serde_json::from_str("\"000042-001\"").unwrap();
        assert_eq!(id.as_str(), "000042-001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"000042-001\"");
        assert!(serde_json::from_str::<TicketId>("\"42\"").is_err());
    }

    #[test]
    fn test_display_line() {
        let project = ListItem::new(ListKind::Project, 1, " tix ", "the tracker");
        let ticket = Ticket {
            id: "000001-001".parse().unwrap(),
            description: "Fix search".to_string(),
            priority: 5,
            project: Some(project),
            status: None,
            assigned_users: vec![],
            listening_users: vec![],
            keywords: vec![],
            minutes_spent: 90,
            minutes_remaining: 20,
        };
        assert_eq!(ticket.to_string(), "000001-001 |   5    | tix | ? | Fix search");
    }

    #[test]
    fn test_list_item_display() {
        assert_eq!(ListItem::new(ListKind::Status, 1, "open", "").to_string(), "open");
        assert_eq!(
            ListItem::new(ListKind::Status, 2, "closed", " done ").to_string(),
            "closed - done"
        );
    }
}
