//! Search query compiler for a small ticket tracker.
//!
//! A query such as `(a=alice OR a=bob) AND p<=2 d="login page"` is scanned
//! into primitives ([`lexer`]), compiled into a parameterized fragment
//! sequence ([`compiler`]), checked for boolean structure ([`parser`]) and run
//! by a [`store::TicketStore`], which for SQLite goes through
//! [`sql_compiler`].

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod field;
pub mod filter;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod search;
pub mod sql_compiler;
pub mod store;
pub mod token;

pub use error::{InvalidSearchQuery, SearchError};
pub use search::{compile, CompiledSearch};
