//! Migrate CSV user exports into PostgreSQL with IP geolocation enrichment.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use user_migration::config::{LogFormat, MigrationSettings};
use user_migration::domain::{
    GeolocationEnricher, IdentityResolver, MigrationPipeline, PersistenceApplier,
    RecordReconciler,
};
use user_migration::outbound::column_mapping::ColumnMapping;
use user_migration::outbound::csv_source::{CsvDirectorySource, DEFAULT_CHUNK_SIZE};
use user_migration::outbound::ip_api::IpApiHttpSource;
use user_migration::outbound::persistence::{
    DbPool, DieselUserStore, PoolConfig, apply_migrations,
};

/// Upper bound on rows per chunk. Eighteen bound columns per inserted row
/// must stay under PostgreSQL's 65535 bind parameters.
const MAX_CHUNK_SIZE: usize = 3000;

/// `user-migration` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "user-migration",
    about = "Reconcile CSV user exports with the users table and enrich them with IP geolocation",
    version
)]
struct CliArgs {
    /// Directory containing the `.csv` exports.
    #[arg(long = "source", value_name = "dir")]
    source: PathBuf,
    /// Rows per batch.
    #[arg(
        long = "chunk-size",
        value_name = "rows",
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_parser = parse_chunk_size
    )]
    chunk_size: usize,
    /// JSON file mapping source column names to canonical fields.
    #[arg(long = "column-mapping", value_name = "path")]
    column_mapping: Option<PathBuf>,
    /// Database connection URL. Falls back to configuration, then `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// Create the `users` table before migrating.
    #[arg(long)]
    migrate: bool,
}

fn main() -> io::Result<()> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = MigrationSettings::load_from_iter([OsString::from("user-migration")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    init_tracing(settings.log_format());

    let mapping = match &args.column_mapping {
        Some(path) => ColumnMapping::load(path)
            .map_err(|error| io::Error::other(format!("load column mapping: {error}")))?,
        None => ColumnMapping::identity(),
    };
    let mut source = CsvDirectorySource::open(&args.source, mapping, args.chunk_size)
        .map_err(|error| io::Error::other(format!("open source directory: {error}")))?;

    let database_url = resolve_database_url(args.database_url, settings.database_url())?;
    let pool = DbPool::new(PoolConfig::new(database_url))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    if args.migrate {
        apply_migrations(&pool)
            .await
            .map_err(|error| io::Error::other(format!("apply migrations: {error}")))?;
    }

    let endpoint = settings
        .geolocation_endpoint()
        .map_err(|error| io::Error::other(format!("parse geolocation endpoint: {error}")))?;
    let geolocation = IpApiHttpSource::new(endpoint, settings.geolocation_timeout())
        .map_err(|error| io::Error::other(format!("build geolocation client: {error}")))?;

    let store = Arc::new(DieselUserStore::new(pool));
    let reconciler = RecordReconciler::new(
        IdentityResolver::new(store.clone()),
        GeolocationEnricher::new(Arc::new(geolocation), settings.enricher_config()),
        Arc::new(DefaultClock),
    );
    let pipeline = MigrationPipeline::new(reconciler, PersistenceApplier::new(store));

    info!(
        source = %args.source.display(),
        chunk_size = args.chunk_size,
        "starting migration"
    );
    let summary = pipeline.run(&mut source).await.map_err(|failure| {
        error!(
            completed_batches = failure.completed_batches(),
            error = %failure,
            "migration halted"
        );
        io::Error::other(format!("migration failed: {failure}"))
    })?;

    println!("batches={}", summary.batches);
    println!("inserted={}", summary.inserted);
    println!("updated={}", summary.updated);
    println!("rejected={}", summary.rejected);

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        warn!(error = %e, "tracing init failed");
    }
}

fn parse_chunk_size(raw: &str) -> Result<usize, String> {
    let size = raw
        .trim()
        .parse::<usize>()
        .map_err(|error| format!("chunk size must be a whole number: {error}"))?;
    if !(1..=MAX_CHUNK_SIZE).contains(&size) {
        return Err(format!("chunk size must be between 1 and {MAX_CHUNK_SIZE}"));
    }
    Ok(size)
}

fn resolve_database_url(explicit: Option<String>, configured: Option<&str>) -> io::Result<String> {
    if let Some(value) = explicit {
        if value.trim().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "--database-url must not be empty when provided",
            ));
        }
        return Ok(value);
    }
    if let Some(value) = configured {
        return Ok(value.to_owned());
    }

    let from_env = env::var("DATABASE_URL").map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "database URL missing: set --database-url, USER_MIGRATION_DATABASE_URL, or DATABASE_URL",
        )
    })?;
    if from_env.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "DATABASE_URL must not be empty",
        ));
    }
    Ok(from_env)
}
