//! Compiled searches: one query, compiled once, executed against a store.

use log::debug;

use crate::compiler::QueryCompiler;
use crate::error::{InvalidSearchQuery, Result, SearchError};
use crate::filter::CompiledFilter;
use crate::model::Ticket;
use crate::parser::Parser;
use crate::store::TicketStore;

/// Compiles `query` against `store`. Shorthand for [`CompiledSearch::new`].
pub fn compile<'s, S: TicketStore + ?Sized>(query: &str, store: &'s S) -> Result<CompiledSearch<'s, S>> {
    CompiledSearch::new(query, store)
}

pub struct CompiledSearch<'s, S: TicketStore + ?Sized> {
    store: &'s S,
    query: String,
    filter: CompiledFilter,
    /// Filled by the first successful `execute`
    results: Option<Vec<Ticket>>,
}

impl<'s, S: TicketStore + ?Sized> CompiledSearch<'s, S> {
    /// Compiles eagerly. Any lexing, field or structural error is returned here.
    pub fn new(query: &str, store: &'s S) -> Result<Self> {
        let filter = QueryCompiler::new(store).compile(query)?;

        let conditions = Parser::new(&filter.fragments)
            .parse()
            .map_err(|e| InvalidSearchQuery::Malformed { detail: e.to_string() })?
            .map_or(0, |expr| expr.leaf_count());

        debug!("compiled query {:?} ({} conditions) to: {}", query, conditions, filter);

        Ok(Self {
            store,
            query: query.to_string(),
            filter,
            results: None,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> &CompiledFilter {
        &self.filter
    }

    /// Runs the filter and hydrates every match, in store order.
    ///
    /// The first successful result set is kept; later calls return it without
    /// touching the store.
    pub fn execute(&mut self) -> Result<&[Ticket]> {
        if self.results.is_none() {
            let tickets = self.fetch()?;
            debug!("query {:?} matched {} tickets", self.query, tickets.len());
            self.results = Some(tickets);
        }
        Ok(self.results.as_deref().unwrap_or_default())
    }

    fn fetch(&self) -> Result<Vec<Ticket>> {
        let ids = self.store.execute_filter(&self.filter)?;

        let mut tickets = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.hydrate_ticket(&id)? {
                Some(ticket) => tickets.push(ticket),
                None => return Err(SearchError::TicketNotFound(id)),
            }
        }
        Ok(tickets)
    }
}
