use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use wavesearch::answer::{Answerer, CommandAnswerer};
use wavesearch::config::{self, Config};
use wavesearch::db::store::Session;
use wavesearch::db::Database;
use wavesearch::error::SearchError;
use wavesearch::export::ExportRequest;
use wavesearch::ingest;
use wavesearch::output::{csv as csv_out, json as json_out, table};
use wavesearch::search::filters::{MultiValue, RawFilters, Scalar};
use wavesearch::search::Engine;

#[derive(Parser)]
#[command(name = "wavesearch", version, about = "Broadcast transcript search: filtered, ranked search over radio/TV transcript segments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.wavesearch/wavesearch.db)
    #[arg(long, global = true, env = "WAVESEARCH_DB")]
    db: Option<PathBuf>,

    /// Path to config file (default: ~/.wavesearch/config.toml)
    #[arg(long, global = true, env = "WAVESEARCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Search text; commas separate clauses, every word is required (prefix* allowed)
    #[arg(short, long)]
    q: Option<String>,

    /// Station code (repeat, or join with '|')
    #[arg(long)]
    station: Vec<String>,

    /// Two-letter state code (repeat, or join with '|')
    #[arg(long)]
    state: Vec<String>,

    /// Speaker label (repeat, or join with '|')
    #[arg(long)]
    speaker: Vec<String>,

    /// Range start (YYYY-MM-DD or datetime); needs --end-date
    #[arg(long)]
    start_date: Option<String>,

    /// Range end, inclusive; needs --start-date
    #[arg(long)]
    end_date: Option<String>,

    /// Sort by datetime: asc or desc (default)
    #[arg(long)]
    sort: Option<String>,
}

impl FilterArgs {
    fn into_raw(self, limit: Option<String>, offset: Option<String>) -> RawFilters {
        let multi = |v: Vec<String>| (!v.is_empty()).then_some(MultiValue::Many(v));
        RawFilters {
            q: self.q,
            station: multi(self.station),
            state: multi(self.state),
            speaker: multi(self.speaker),
            start_date: self.start_date,
            end_date: self.end_date,
            sort: self.sort,
            limit: limit.map(Scalar::Text),
            offset: offset.map(Scalar::Text),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List known station and state codes
    Filters,

    /// Search transcript segments
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page size (default 50, max 100)
        #[arg(long)]
        limit: Option<String>,

        /// Rows to skip
        #[arg(long)]
        offset: Option<String>,
    },

    /// Count matching segments per bucket
    Aggregate {
        #[command(flatten)]
        filters: FilterArgs,

        /// Bucket: date, week, month, or station
        #[arg(long, default_value = "date")]
        group_by: String,
    },

    /// Show segments broadcast before or after a segment
    Context {
        /// Anchor segment ID
        id: i64,

        /// before or after
        direction: String,

        /// Number of segments (default 5, max 20)
        #[arg(long)]
        count: Option<i64>,
    },

    /// Export all matching segments as CSV, with optional context rows
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        /// Context map as JSON, or @file: {"<id>": {"before": n, "after": n}}
        #[arg(long)]
        context: Option<String>,

        /// Full JSON request body ({"filters": .., "contextRequested": ..}); overrides other flags
        #[arg(long, conflicts_with = "context")]
        request: Option<PathBuf>,

        /// Write CSV to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ingest broadcast transcript JSON files
    Ingest {
        /// File, directory, or glob paths
        paths: Vec<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask the configured answer command a question
    Ask {
        question: String,
    },

    /// Show database statistics
    Stats,

    /// Rebuild the FTS5 index
    Reindex,

    /// Show database info
    Info,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a commented default config if none exists
    Init,
    /// Print the effective settings
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db_path = cli.db;
    let open_db = || -> Result<Database> {
        let path = match &db_path {
            Some(path) => path.clone(),
            None => Database::default_db_path()?,
        };
        Database::open(&path)
    };

    match cli.command {
        Commands::Filters => {
            let db = open_db()?;
            let vocab = with_engine(&db, &config, |e| e.vocabularies())?;
            if json_output {
                json_out::print_json(&vocab)?;
            } else {
                table::print_vocabularies(&vocab);
            }
        }

        Commands::Search {
            filters,
            limit,
            offset,
        } => {
            let db = open_db()?;
            let raw = filters.into_raw(limit, offset);
            let page = with_engine(&db, &config, |e| e.search(&raw))?;
            if json_output {
                json_out::print_json(&page)?;
            } else {
                table::print_search_page(&page);
            }
        }

        Commands::Aggregate { filters, group_by } => {
            let db = open_db()?;
            let raw = filters.into_raw(None, None);
            let buckets = with_engine(&db, &config, |e| e.aggregate(&raw, Some(&group_by)))?;
            if json_output {
                json_out::print_json(&buckets)?;
            } else {
                table::print_buckets(&buckets);
            }
        }

        Commands::Context {
            id,
            direction,
            count,
        } => {
            let db = open_db()?;
            let segments = with_engine(&db, &config, |e| e.context(id, &direction, count))?;
            if json_output {
                json_out::print_json(&segments)?;
            } else {
                table::print_segments(&segments);
            }
        }

        Commands::Export {
            filters,
            context,
            request,
            output,
        } => {
            let request = match request {
                Some(path) => read_export_request(&path)?,
                None => ExportRequest {
                    filters: filters.into_raw(None, None),
                    context_requested: match context {
                        Some(arg) => parse_context_arg(&arg)?,
                        None => serde_json::Value::Null,
                    },
                },
            };

            let db = open_db()?;
            let rows = with_engine(&db, &config, |e| e.export_rows(&request))?;
            let bytes = csv_out::to_csv_bytes(&rows)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("Failed to write: {}", path.display()))?;
                    eprintln!("Exported {} row{} to {}", rows.len(), if rows.len() == 1 { "" } else { "s" }, path.display());
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().lock().write_all(&bytes)?;
                }
            }
        }

        Commands::Ingest { paths, dry_run } => {
            if paths.is_empty() {
                anyhow::bail!("No paths provided.");
            }
            let db = open_db()?;
            let stats = ingest::ingest_paths(&db, &paths, dry_run)?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                let action = if dry_run { "Would ingest" } else { "Ingested" };
                println!(
                    "{action} {} segment{} from {} file{}",
                    stats.segments,
                    if stats.segments == 1 { "" } else { "s" },
                    stats.files,
                    if stats.files == 1 { "" } else { "s" },
                );
                if stats.already_ingested > 0 {
                    println!("  {} already ingested", stats.already_ingested);
                }
                if stats.rejected > 0 {
                    println!("  {} rejected (see log)", stats.rejected);
                }
                if stats.skipped_segments > 0 {
                    println!("  {} segment entries skipped", stats.skipped_segments);
                }
            }
        }

        Commands::Stats => {
            let db = open_db()?;
            let stats = db.stats()?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                table::print_stats(&stats);
            }
        }

        Commands::Reindex => {
            let db = open_db()?;
            println!("Rebuilding FTS5 index...");
            db.reindex()?;
            println!("Done.");
        }

        Commands::Info => {
            let db = open_db()?;
            let stats = db.stats()?;
            let schema_ver = db.schema_version()?.unwrap_or_else(|| "unknown".to_string());
            let migrations = db.migrations()?;

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "schema_version": schema_ver,
                    "migrations": migrations,
                    "db_path": db.path.display().to_string(),
                    "db_size_bytes": stats.db_size_bytes,
                    "segments": stats.segments,
                    "stations": stats.stations,
                }))?;
            } else {
                println!("wavesearch v{}", env!("CARGO_PKG_VERSION"));
                println!("  Schema:     v{schema_ver} ({} migrations)", migrations.len());
                println!("  Database:   {}", db.path.display());
                println!("  Size:       {}", table::format_bytes(stats.db_size_bytes));
                println!("  Segments:   {}", stats.segments);
                println!("  Stations:   {}", stats.stations);
            }
        }

        Commands::Ask { question } => {
            let answer = CommandAnswerer::from_config(config.answer.as_ref()).answer(&question)?;
            if json_output {
                json_out::print_json(&answer)?;
            } else {
                println!("{}", answer.answer);
            }
        }

        Commands::Config { action } => run_config(&action, &config)?,
    }

    Ok(())
}

/// Run one engine operation on a session held for exactly its duration.
fn with_engine<T>(
    db: &Database,
    config: &Config,
    op: impl FnOnce(&Engine<'_, Session<'_>>) -> Result<T, SearchError>,
) -> Result<T> {
    let session = db.session()?;
    let engine = Engine::new(&session, config.limits(), config.expander());
    Ok(op(&engine)?)
}

fn run_config(action: &ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config::config_path()?;
            if config::init_config()? {
                println!("Created {}", path.display());
            } else {
                println!("Config already exists: {}", path.display());
            }
        }
        ConfigAction::Show => println!("{}", config.display()),
    }
    Ok(())
}

/// `--context` accepts inline JSON or `@path`. Malformed JSON is a
/// validation error, raised before the database is touched.
fn parse_context_arg(arg: &str) -> Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context map: {path}"))?,
        None => arg.to_string(),
    };
    let value = serde_json::from_str(&text).map_err(|e| {
        SearchError::invalid("contextRequested", format!("malformed JSON: {e}"))
    })?;
    Ok(value)
}

fn read_export_request(path: &Path) -> Result<ExportRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read export request: {}", path.display()))?;
    let request = serde_json::from_str(&text)
        .map_err(|e| SearchError::invalid("request", format!("malformed export request: {e}")))?;
    Ok(request)
}
