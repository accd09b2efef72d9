//! Streaming-history import tool.
//!
//! Reads the audio export files in a data directory and loads them into the
//! SQLite history database. Partial failures (bad records, unreadable files,
//! failed batches) are reported in the final summary; only missing
//! configuration aborts the run.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use streamfacts::config::{AppConfig, CliConfig, FileConfig};
use streamfacts::etl::Pipeline;
use streamfacts::store::SqliteHistoryStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streamfacts")]
#[command(about = "Import Spotify streaming-history exports into a SQLite star schema")]
struct Args {
    /// Directory containing the streaming-history export files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to the output SQLite database file (defaults to history.db in the data directory)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Number of fact rows per transaction
    #[arg(long)]
    batch_size: Option<usize>,

    /// Optional TOML config file; its values override the CLI arguments
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli = CliConfig {
        data_dir: args.data_dir,
        db_path: args.db_path,
        batch_size: args.batch_size,
    };
    let config = AppConfig::resolve(&cli, file_config)?;

    info!("Streaming History Import");
    info!("========================");
    info!("Data directory: {}", config.data_dir.display());
    info!("Database: {}", config.db_path.display());
    info!("Batch size: {}", config.batch_size);

    let store = SqliteHistoryStore::open(&config.db_path)?;
    let pipeline = Pipeline::new(&store, config.batch_size);
    let summary = pipeline.run(&config.data_dir)?;

    info!("");
    info!("Import Summary");
    info!("==============");
    info!("{}", serde_json::to_string_pretty(&summary)?);
    if summary.failed_files > 0 || summary.failed_batches > 0 || summary.rejected_records > 0 {
        warn!(
            "Degraded run: {} failed files, {} failed batches, {} rejected records",
            summary.failed_files, summary.failed_batches, summary.rejected_records
        );
    }

    Ok(())
}
