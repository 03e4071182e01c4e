use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use tix::config::{TixConfig, DEFAULT_CONFIG_FILE};
use tix::field::FIELDS;
use tix::sql_compiler::SqlCompiler;
use tix::store::{SqliteTicketStore, TicketStore};
use tix::{compile, SearchError};

/// Search tickets with a compact query language.
#[derive(Parser, Debug)]
#[command(name = "tix", about = "Search the ticket database", after_help = field_help())]
struct Args {
    /// JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Ticket database; overrides the configuration file
    #[arg(long, env = "TIX_DATABASE")]
    database: Option<PathBuf>,

    /// Print results as a JSON array
    #[arg(long)]
    json: bool,

    /// Print the compiled filter and its parameters before the results
    #[arg(long)]
    show_sql: bool,

    /// Query to run; prompts interactively when omitted
    query: Vec<String>,
}

fn field_help() -> String {
    let mut help = String::from("Search fields:\n");
    for spec in FIELDS.iter() {
        let ops: Vec<&str> = spec.allowed_ops.iter().map(|op| op.as_str()).collect();
        help.push_str(&format!("  {}  {:<18} {}\n", spec.letter, spec.help, ops.join(" ")));
    }
    help.push_str("\nCombine conditions with AND, OR and brackets; quote values containing spaces.");
    help
}

/// Outcome of one query, as far as the exit status is concerned.
#[derive(Debug, PartialEq)]
enum Outcome {
    Ok,
    InvalidQuery,
    Failed,
}

fn run_query<S: TicketStore + ?Sized>(store: &S, query: &str, args: &Args) -> Result<Outcome> {
    let mut search = match compile(query, store) {
        Ok(search) => search,
        Err(SearchError::InvalidQuery(e)) => {
            println!("INVALID QUERY: {}", e);
            return Ok(Outcome::InvalidQuery);
        }
        Err(e) => return Err(e.into()),
    };

    if args.show_sql {
        println!("query: {}", search.query());
        println!("{}", search.filter());
        let expr = tix::parser::Parser::new(&search.filter().fragments).parse()?;
        let sql = SqlCompiler::new(&search.filter().params).preview(expr.as_ref())?;
        println!("{}\n", sql);
    }

    let tickets = match search.execute() {
        Ok(tickets) => tickets,
        Err(SearchError::InvalidQuery(e)) => {
            println!("INVALID QUERY: {}", e);
            return Ok(Outcome::InvalidQuery);
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(tickets)?);
    } else if tickets.is_empty() {
        println!("No tickets found");
    } else {
        for ticket in tickets {
            println!("{}", ticket);
        }
    }

    Ok(Outcome::Ok)
}

/// Runs one query typed at the prompt. Failures are reported and the
/// session carries on.
fn prompt_query<S: TicketStore + ?Sized>(store: &S, query: &str, args: &Args) -> Outcome {
    match run_query(store, query, args) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {:#}", e);
            Outcome::Failed
        }
    }
}

fn interactive(store: &SqliteTicketStore, args: &Args, config: &TixConfig) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    if let Some(history) = &config.history_file {
        // a missing history file is normal on first run
        let _ = editor.load_history(history);
    }

    loop {
        match editor.readline("Query: ") {
            Ok(line) => {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(query);
                prompt_query(store, query, args);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(history) = &config.history_file {
        editor
            .save_history(history)
            .with_context(|| format!("saving history to {}", history.display()))?;
    }
    Ok(())
}

fn run(args: Args) -> Result<ExitCode> {
    let config = TixConfig::load_or_default(&args.config)?;
    let database = args
        .database
        .clone()
        .unwrap_or_else(|| config.database_file.clone());
    let store = SqliteTicketStore::open(&database)
        .with_context(|| format!("opening ticket database {}", database.display()))?;

    if args.query.is_empty() {
        interactive(&store, &args, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let query = args.query.join(" ");
    match run_query(&store, &query, &args)? {
        Outcome::Ok => Ok(ExitCode::SUCCESS),
        Outcome::InvalidQuery => Ok(ExitCode::from(2)),
        Outcome::Failed => Ok(ExitCode::FAILURE),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix::filter::CompiledFilter;
    use tix::model::{InvalidTicketId, ListKind, Ticket, TicketId};
    use tix::store::{ListItemResolver, StoreError};

    /// Resolves nothing and fails every filter execution.
    struct BrokenStore;

    impl ListItemResolver for BrokenStore {
        fn resolve_list_item(&self, _kind: ListKind, _short_name: &str) -> Result<Option<i64>, StoreError> {
            Ok(None)
        }
    }

    impl TicketStore for BrokenStore {
        fn execute_filter(&self, _filter: &CompiledFilter) -> Result<Vec<TicketId>, StoreError> {
            Err(StoreError::InvalidTicketId(InvalidTicketId("garbage".to_string())))
        }

        fn ticket_exists(&self, _id: &TicketId) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn hydrate_ticket(&self, _id: &TicketId) -> Result<Option<Ticket>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn test_prompt_survives_store_failures() {
        let args = Args::parse_from(["tix"]);
        let store = BrokenStore;

        assert!(run_query(&store, "d=foo", &args).is_err());
        assert_eq!(prompt_query(&store, "d=foo", &args), Outcome::Failed);
        assert_eq!(prompt_query(&store, "z=1", &args), Outcome::InvalidQuery);
        assert_eq!(prompt_query(&store, "d=foo", &args), Outcome::Failed);
    }

    #[test]
    fn test_field_help_lists_every_field() {
        let help = field_help();
        for spec in FIELDS.iter() {
            assert!(help.contains(spec.help), "{}", spec.help);
        }
    }
}
