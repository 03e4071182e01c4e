//! Errors surfaced to callers of the search compiler.

use thiserror::Error;

use crate::model::{ListKind, TicketId};
use crate::store::StoreError;
use crate::token::{RelOp, Span};

/// Every way a query string can be rejected.
///
/// None of these are recoverable locally; the caller has to ask for a
/// corrected query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSearchQuery {
    #[error("[{field}] is not a valid search field")]
    UnknownField { field: char },

    #[error("[{op}] is not supported for [{field}]")]
    UnsupportedOperator { field: char, op: RelOp },

    #[error("missing value for [{field}] (quote it to search for the empty string)")]
    MissingValue { field: char },

    #[error("[{value}] is not a valid value for [{field}]")]
    InvalidValue { field: char, value: String },

    #[error("{kind} [{name}] not found")]
    UnresolvedListItem { kind: ListKind, name: String },

    #[error("junk text in query: [{text}]")]
    JunkText { text: String, span: Span },

    #[error("junk trailing text: [{text}]")]
    TrailingJunk { text: String, span: Span },

    #[error("malformed search query (check braces and boolean operators): {detail}")]
    Malformed { detail: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    InvalidQuery(#[from] InvalidSearchQuery),

    /// The ticket matched the filter but was gone by the time it was loaded.
    #[error("ticket [{0}] does not exist")]
    TicketNotFound(TicketId),

    #[error("ticket store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for SearchError {
    /// Structural rejections from the filter executor are query errors; anything
    /// else is a genuine storage failure.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MalformedFilter(detail) => {
                SearchError::InvalidQuery(InvalidSearchQuery::Malformed { detail })
            }
            StoreError::UnboundParameter(name) => {
                SearchError::InvalidQuery(InvalidSearchQuery::Malformed {
                    detail: format!("parameter {} is not bound", name),
                })
            }
            other => SearchError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
