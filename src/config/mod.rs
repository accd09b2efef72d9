mod file_config;

pub use file_config::FileConfig;

use crate::etl::DEFAULT_BATCH_SIZE;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the streaming-history export files.
    pub data_dir: PathBuf,
    /// Path to the SQLite history database file.
    pub db_path: PathBuf,
    /// Number of fact rows per transaction.
    pub batch_size: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        // Missing input directory is the one whole-run-fatal condition
        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .unwrap_or_else(|| data_dir.join("history.db"));

        let batch_size = file
            .batch_size
            .or(cli.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }

        Ok(Self {
            data_dir,
            db_path,
            batch_size,
        })
    }
}
