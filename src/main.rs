use std::process::ExitCode;

use bookkeeper::config::Config;
use bookkeeper::date_utils::parse_timestamp;
use bookkeeper::error::{AppError, AppResult};
use bookkeeper::services::Bookkeeper;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const USAGE: &str = "usage: bookkeeper <command>

commands:
  tree                 category hierarchy as nested JSON
  categories           all categories
  expenses [FROM TO]   all expenses, or those dated in (FROM, TO]
  budgets              current day, week and month budgets
  seed <outline-file>  add categories from an indented outline";

enum Command {
    Tree,
    Categories,
    Expenses(Option<(String, String)>),
    Budgets,
    Seed(String),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["tree"] => Some(Self::Tree),
            ["categories"] => Some(Self::Categories),
            ["expenses"] => Some(Self::Expenses(None)),
            ["expenses", from, to] => Some(Self::Expenses(Some((from.to_string(), to.to_string())))),
            ["budgets"] => Some(Self::Budgets),
            ["seed", path] => Some(Self::Seed(path.to_string())),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookkeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.kind(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> AppResult<()> {
    let config = Config::from_env()?;
    tracing::debug!(db = %config.database_path.display(), pool_size = ?config.pool_size, "Opening bookkeeper");
    let books = Bookkeeper::open(config.storage()?)?;

    match command {
        Command::Tree => print_json(&books.category_tree()?.to_nested_json()),
        Command::Categories => print_json(&books.category_repository().list()?),
        Command::Expenses(None) => print_json(&books.expenses()?),
        Command::Expenses(Some((from, to))) => {
            print_json(&books.expenses_between(timestamp_arg(&from)?, timestamp_arg(&to)?)?)
        }
        Command::Budgets => print_json(&books.current_budgets()?),
        Command::Seed(path) => {
            let text = std::fs::read_to_string(&path)?;
            let pks = books.seed_categories(text.lines())?;
            tracing::info!(count = pks.len(), file = %path, "Seeded categories from outline");
            print_json(&books.category_tree()?.to_nested_json())
        }
    }
}

fn timestamp_arg(raw: &str) -> AppResult<NaiveDateTime> {
    parse_timestamp(raw).ok_or_else(|| AppError::Validation(format!("invalid date '{}'", raw)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> AppResult<()> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Validation(format!("cannot render output: {}", e)))?;
    println!("{}", out);
    Ok(())
}
