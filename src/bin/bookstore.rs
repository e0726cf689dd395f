use bookstore::Database;
use bookstore::cli::{self as prog_cli, Command, OutputMode, ReportKind, RunContext};
use bookstore::config::{ConfigOverrides, load_config};
use bookstore::utils::fsutil::normalize_db_path;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about = "Book collection query CLI", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, global = true, help = "Path to a config file (TOML). If omitted, ./bookstore.toml and the user config dir are tried.")]
    config: Option<PathBuf>,
    /// Override DB path (takes precedence over config)
    #[arg(long, global = true, help = "Database path (e.g., plp_bookstore.db). Takes precedence over config/env.")]
    db: Option<PathBuf>,
    #[arg(long, global = true, help = "Collection to operate on (default: books)")]
    collection: Option<String>,
    #[arg(long, global = true, help = "Print summaries as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Report {
    AvgPrice,
    TopAuthor,
    Decades,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Find books matching a filter; prints NDJSON to stdout")]
    Find {
        #[arg(default_value = "{}", help = "Filter JSON (e.g., {\"published_year\": {\"$gt\": 2000}})")]
        filter: String,
        #[arg(long, help = "Projection JSON (e.g., {\"_id\": 0, \"title\": 1})")]
        project: Option<String>,
        #[arg(long, help = "Sort JSON (e.g., {\"price\": -1})")]
        sort: Option<String>,
        #[arg(long, help = "Skip N results")]
        skip: Option<usize>,
        #[arg(long, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, conflicts_with_all = ["skip", "limit"], help = "Page number (1-based) of page_size books")]
        page: Option<usize>,
    },
    #[command(about = "Count books matching a filter")]
    Count {
        #[arg(default_value = "{}", help = "Filter JSON")]
        filter: String,
    },
    #[command(name = "update-one", about = "Update the first book matching a filter")]
    UpdateOne {
        #[arg(help = "Filter JSON")]
        filter: String,
        #[arg(help = "Update JSON (e.g., {\"$set\": {\"price\": 15.99}})")]
        update: String,
    },
    #[command(name = "delete-one", about = "Delete the first book matching a filter")]
    DeleteOne {
        #[arg(help = "Filter JSON")]
        filter: String,
    },
    #[command(about = "Run an aggregation pipeline (JSON array of stages)")]
    Aggregate {
        #[arg(help = "Pipeline JSON")]
        pipeline: String,
    },
    #[command(about = "Run a canned report")]
    Report {
        #[arg(value_enum)]
        kind: Report,
    },
    #[command(name = "create-index", about = "Declare an index (e.g., {\"author\": 1, \"published_year\": -1})")]
    CreateIndex {
        #[arg(help = "Index keys JSON")]
        keys: String,
        #[arg(long, help = "Explicit index name")]
        name: Option<String>,
    },
    #[command(name = "drop-index", about = "Drop an index by name")]
    DropIndex { name: String },
    #[command(name = "list-indexes", about = "List declared indexes")]
    ListIndexes,
    #[command(name = "list-collections", about = "List collections in the database")]
    ListCollections,
    #[command(about = "Show how a find would be answered (COLLSCAN or IXSCAN)")]
    Explain {
        #[arg(default_value = "{}", help = "Filter JSON")]
        filter: String,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    #[command(about = "Import books from a JSON array or NDJSON file")]
    Import {
        #[arg(help = "Path to input file")]
        file: PathBuf,
        #[arg(long, help = "Format override: ndjson|json; defaults to auto-detect")]
        format: Option<String>,
        #[arg(long, help = "Abort on the first invalid record instead of skipping it")]
        fail_fast: bool,
    },
}

impl From<Commands> for Command {
    fn from(c: Commands) -> Self {
        match c {
            Commands::Find { filter, project, sort, skip, limit, page } => {
                Self::Find { filter_json: filter, project, sort, skip, limit, page }
            }
            Commands::Count { filter } => Self::Count { filter_json: filter },
            Commands::UpdateOne { filter, update } => Self::UpdateOne { filter_json: filter, update_json: update },
            Commands::DeleteOne { filter } => Self::DeleteOne { filter_json: filter },
            Commands::Aggregate { pipeline } => Self::Aggregate { pipeline_json: pipeline },
            Commands::Report { kind } => Self::Report(match kind {
                Report::AvgPrice => ReportKind::AvgPrice,
                Report::TopAuthor => ReportKind::TopAuthor,
                Report::Decades => ReportKind::Decades,
            }),
            Commands::CreateIndex { keys, name } => Self::CreateIndex { keys_json: keys, name },
            Commands::DropIndex { name } => Self::DropIndex { name },
            Commands::ListIndexes => Self::ListIndexes,
            Commands::ListCollections => Self::ListCollections,
            Commands::Explain { filter, sort, skip, limit } => Self::Explain { filter_json: filter, sort, skip, limit },
            Commands::Import { file, format, fail_fast } => Self::Import { file, format, fail_fast },
        }
    }
}

fn real_main(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let overrides = ConfigOverrides { config: cli.config, db_path: cli.db, collection: cli.collection };
    let cfg = load_config(&overrides)?;
    let devlog = std::env::var("BOOKSTORE_DEVLOG").is_ok_and(|s| matches!(s.as_str(), "1" | "true" | "yes"));
    if let Err(e) = bookstore::logger::configure_logging(cfg.log_dir.as_deref(), cfg.log_level.as_deref(), None, devlog) {
        eprintln!("warning: logging disabled: {e}");
    }
    let db_path = cfg.db_path.clone().unwrap_or_else(|| normalize_db_path(None));
    let db = Database::open(&db_path)?;
    db.ensure_collection(&cfg.collection)?;
    let ctx = RunContext {
        collection: cfg.collection,
        page_size: cfg.page_size,
        mode: if cli.json { OutputMode::Json } else { OutputMode::Human },
    };
    prog_cli::run(&db, &ctx, cli.command.into())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = real_main(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
