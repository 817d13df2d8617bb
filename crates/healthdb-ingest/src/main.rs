//! HealthDB - health export to SQLite

mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use healthdb_common::config::StoreConfig;
use healthdb_common::logging::{init_logging, LogConfig, LogLevel};
use healthdb_ingest::export::ExportIngester;
use healthdb_ingest::{db, postprocess, IngestError, IngestOptions, PostprocessOptions};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "healthdb")]
#[command(author, version, about = "Load a health export into SQLite")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream an export into the base tables
    Ingest {
        /// Export file (plain XML or .gz)
        #[arg(default_value = "export.xml")]
        export: PathBuf,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Rows buffered per table before a batch is committed
        #[arg(long)]
        batch_size: Option<usize>,

        /// Also store record metadata entries
        #[arg(long)]
        with_metadata: bool,

        /// Stop after this many entities
        #[arg(long)]
        max_elements: Option<u64>,
    },

    /// Build source aliases and views, then import routes and ECGs
    Postprocess {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Directory of GPX workout routes
        #[arg(long)]
        routes_dir: Option<PathBuf>,

        /// Directory of ECG CSV files
        #[arg(long)]
        ecg_dir: Option<PathBuf>,

        /// Skip files whose path is already stored
        #[arg(long, overrides_with = "no_skip_existing")]
        skip_existing: bool,

        /// Re-read every file, even ones already stored
        #[arg(long, overrides_with = "skip_existing")]
        no_skip_existing: bool,

        /// Do not import workout routes
        #[arg(long)]
        no_routes: bool,

        /// Do not import ECG recordings
        #[arg(long)]
        no_ecg: bool,

        /// Buffered points or samples before a batch is committed
        #[arg(long)]
        flush_threshold: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);

        let code = e
            .downcast_ref::<IngestError>()
            .map(IngestError::exit_code)
            .unwrap_or(1);
        process::exit(i32::from(code));
    }
}

async fn run(cli: Cli) -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = log_config(cli.verbose)?;
    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Ingest {
            export,
            db,
            batch_size,
            with_metadata,
            max_elements,
        } => {
            let mut options = IngestOptions::from_env()?;
            if let Some(batch_size) = batch_size {
                options.batch_size = batch_size;
            }
            if with_metadata {
                options.capture_metadata = true;
            }
            if max_elements.is_some() {
                options.max_elements = max_elements;
            }

            let pool = db::open_store(&store_config(db)?).await?;
            let spinner = progress::create_element_spinner("Ingesting")?;

            let summary = ExportIngester::new(&pool, options)
                .with_progress(spinner)
                .ingest(&export)
                .await?;

            info!(
                elements = summary.elements,
                entities = summary.counts.entities(),
                "Ingestion complete"
            );
            pool.close().await;
        },
        Command::Postprocess {
            db,
            routes_dir,
            ecg_dir,
            skip_existing,
            no_skip_existing,
            no_routes,
            no_ecg,
            flush_threshold,
        } => {
            let mut options = PostprocessOptions::from_env()?;
            if routes_dir.is_some() {
                options.routes_dir = routes_dir;
            }
            if ecg_dir.is_some() {
                options.ecg_dir = ecg_dir;
            }
            if no_routes {
                options.routes_dir = None;
            }
            if no_ecg {
                options.ecg_dir = None;
            }
            if skip_existing {
                options.skip_existing = true;
            }
            if no_skip_existing {
                options.skip_existing = false;
            }
            if let Some(threshold) = flush_threshold {
                options.flush_threshold = threshold;
            }

            let pool = db::open_store(&store_config(db)?).await?;
            let summary = postprocess(&pool, &options).await?;

            info!(
                routes_added = summary.routes_added,
                ecgs_added = summary.ecgs_added,
                "Post-processing complete"
            );
            pool.close().await;
        },
    }

    Ok(())
}

/// Logging from the environment, with `--verbose` taking precedence
fn log_config(verbose: bool) -> Result<LogConfig> {
    let mut config = LogConfig::builder()
        .log_file_prefix("healthdb")
        .build()
        .merge_env()?;

    if verbose {
        config.level = LogLevel::Debug;
    }
    Ok(config)
}

/// Store from the environment, with `--db` taking precedence
fn store_config(db: Option<PathBuf>) -> Result<StoreConfig> {
    let mut config = StoreConfig::from_env()?;
    if let Some(path) = db {
        config.path = path;
    }
    config.validate()?;
    Ok(config)
}
