mod config;
mod registry;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, SeedConfig};
use registry::{
    RunContext, init_console_logging, init_run_logging, redact_connection_string, start_run,
    write_cache, write_json, write_report,
};
use seedkit_core::{SeedDocument, StoreError};
use seedkit_engine::{InMemoryStore, SeedError, SeedOptions, Seeder};
use seedkit_postgres::PostgresStore;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("seed error: {0}")]
    Seed(#[from] SeedError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to read seed document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("seed document {path} is not valid JSON: {source}")]
    DocumentJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "seedkit", version, about = "Load fixture documents into a database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed a database from a JSON document.
    Seed(SeedArgs),
    /// Resolve a document against an in-memory store without touching a database.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Seed document (JSON).
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,
    /// Database connection string (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string (positional form).
    #[arg(value_name = "CONNECTION_STRING", required_unless_present = "conn")]
    conn_pos: Option<String>,
    /// Path to seedkit.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Drop each target collection before inserting.
    #[arg(long, default_value_t = false)]
    drop: bool,
    /// Fail when an expression cannot be evaluated.
    #[arg(long, default_value_t = false)]
    strict_expressions: bool,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Optional extra path for the record cache JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Seed document (JSON).
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,
    /// Path to seedkit.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fail when an expression cannot be evaluated.
    #[arg(long, default_value_t = false)]
    strict_expressions: bool,
    /// Optional path for the record cache JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Seed(args) => run_seed(args).await,
        Command::Check(args) => run_check(args).await,
    }
}

async fn run_seed(args: SeedArgs) -> Result<(), CliError> {
    let SeedArgs {
        document: document_path,
        conn,
        conn_pos,
        config,
        drop,
        strict_expressions,
        run_dir,
        out,
    } = args;

    let conn = match (conn, conn_pos) {
        (Some(value), None) | (None, Some(value)) => value,
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidConfig(
                "use either --conn or positional connection string".to_string(),
            ));
        }
        (None, None) => {
            return Err(CliError::InvalidConfig(
                "connection string is required".to_string(),
            ));
        }
    };
    let engine = detect_engine(&conn)?;

    let config = load_config(config.as_deref())?;
    let options = merge_options(&config.seed, drop, strict_expressions);
    let capabilities = config.capabilities()?;
    let document = read_document(&document_path)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        engine: engine.to_string(),
        document: document_path.clone(),
        db_schema: config.database.schema.clone(),
        run_dir,
        options: options.clone(),
        connection: redact_connection_string(&conn),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, engine = %engine);
    let (collections, records) = summarize(&document);
    tracing::info!(
        event = "document_loaded",
        path = %document_path.display(),
        collections,
        records
    );

    let timer = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
        .connect(&conn)
        .await?;
    let store = PostgresStore::new(pool, config.models.clone())
        .with_schema(config.database.schema.clone());
    store.ensure_schema().await?;
    tracing::info!(event = "store_ready", schema = %store.schema());

    let seeder = Seeder::new(Arc::new(store))
        .with_capabilities(capabilities)
        .with_options(options);

    tracing::info!(event = "seed_started", run_id = %run_id);
    let outcome = match seeder.run_with_id(run_id.clone(), &document).await {
        Ok(outcome) => {
            tracing::info!(
                event = "seed_finished",
                collections = outcome.report.collections.len(),
                records = outcome.report.records_total,
                fallbacks = outcome.report.expression_fallbacks.len()
            );
            outcome
        }
        Err(err) => {
            tracing::info!(
                event = "run_finished",
                status = "failure",
                code = err.code(),
                duration_ms = timer.elapsed().as_millis() as u64
            );
            return Err(err.into());
        }
    };

    write_report(&run_paths, &outcome.report)?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    write_cache(&run_paths, &outcome.cache, out.as_deref())?;
    tracing::info!(event = "cache_written", path = %run_paths.cache_path.display());

    tracing::info!(
        event = "run_finished",
        status = "success",
        records = outcome.report.records_total,
        duration_ms = timer.elapsed().as_millis() as u64
    );

    Ok(())
}

async fn run_check(args: CheckArgs) -> Result<(), CliError> {
    init_console_logging()?;

    let config = load_config(args.config.as_deref())?;
    let options = merge_options(&config.seed, false, args.strict_expressions);
    let document = read_document(&args.document)?;

    let store = Arc::new(InMemoryStore::new(config.models.clone()));
    let outcome = Seeder::new(store)
        .with_capabilities(config.capabilities()?)
        .with_options(options)
        .run(&document)
        .await?;

    if let Some(out) = args.out.as_deref() {
        write_json(out, &outcome.cache)?;
    }

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &outcome.report)
        .map_err(registry::RegistryError::from)?;
    writeln!(stdout)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SeedConfig, CliError> {
    match path {
        Some(path) => Ok(SeedConfig::load(path)?),
        None => Ok(SeedConfig::default()),
    }
}

/// Command-line switches can only turn options on.
fn merge_options(base: &SeedOptions, drop: bool, strict_expressions: bool) -> SeedOptions {
    SeedOptions {
        drop_collections: base.drop_collections || drop,
        strict_expressions: base.strict_expressions || strict_expressions,
    }
}

fn read_document(path: &Path) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CliError::Document {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::DocumentJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Collection and record counts, or zeros when the document is malformed.
fn summarize(document: &Value) -> (usize, usize) {
    SeedDocument::from_value(document)
        .map(|parsed| (parsed.collections.len(), parsed.record_count()))
        .unwrap_or_default()
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(conn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_postgres_urls_are_supported() {
        assert_eq!(detect_engine("postgres://localhost/db").unwrap(), "postgres");
        assert_eq!(detect_engine("postgresql://localhost/db").unwrap(), "postgres");
        assert!(matches!(
            detect_engine("mongodb://localhost/db"),
            Err(CliError::UnsupportedEngine(_))
        ));
    }

    #[test]
    fn flags_extend_configured_options() {
        let base = SeedOptions {
            drop_collections: true,
            strict_expressions: false,
        };
        let merged = merge_options(&base, false, true);
        assert!(merged.drop_collections);
        assert!(merged.strict_expressions);
    }

    #[test]
    fn parses_seed_command() {
        let cli = Cli::try_parse_from([
            "seedkit",
            "seed",
            "data.json",
            "--conn",
            "postgres://localhost/db",
            "--drop",
        ])
        .unwrap();
        let Command::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        assert_eq!(args.document, PathBuf::from("data.json"));
        assert_eq!(args.conn.as_deref(), Some("postgres://localhost/db"));
        assert!(args.drop);
        assert_eq!(args.run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn summarize_counts_collections_and_records() {
        let document = serde_json::json!({
            "_dependencies": {},
            "teams": {"_model": "Team", "a": {}, "b": {}},
            "users": {"_model": "User", "u": {}}
        });
        assert_eq!(summarize(&document), (2, 3));
        assert_eq!(summarize(&serde_json::json!([])), (0, 0));
    }
}
